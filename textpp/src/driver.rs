//! Directive scanning and dispatch.
//!
//! Input is consumed as alternating runs of plain text and `#keyword`
//! directives. Plain text is handed to the expander; directives mutate
//! the macro table, open a conditional block, or pass through verbatim
//! when the keyword is not recognized.

use log::debug;

use crate::condition;
use crate::error::PreprocessError;
use crate::expand::Expander;
use crate::macros::MacroTable;

/// One `#keyword` occurrence. All positions are byte offsets into the
/// scanned slice; they always sit next to ASCII, so slicing at them is
/// safe.
pub(crate) struct DirectiveMatch {
    /// Offset of the `#`.
    pub(crate) start: usize,
    /// Keyword text without the `#`.
    pub(crate) keyword: String,
    /// Offset just past the keyword.
    pub(crate) tail_start: usize,
    /// Offset of the newline ending the keyword's line, or the slice
    /// length. Continuation lines extend past this.
    pub(crate) line_end: usize,
}

/// Find the next `#` immediately followed by a keyword. A `#` preceded
/// by another `#` is part of a paste operator and never starts a
/// directive.
pub(crate) fn find_directive(text: &str) -> Option<DirectiveMatch> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'#' {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
            j += 1;
        }
        if j == i + 1 || (i > 0 && bytes[i - 1] == b'#') {
            i = j.max(i + 1);
            continue;
        }
        let line_end = text[j..].find('\n').map_or(text.len(), |p| j + p);
        return Some(DirectiveMatch {
            start: i,
            keyword: text[i + 1..j].to_string(),
            tail_start: j,
            line_end,
        });
    }
    None
}

/// Offset of the newline that ends the directive whose tail starts at
/// `from`, skipping lines continued with a trailing backslash. Returns
/// `text.len()` when the final line is unterminated.
pub(crate) fn directive_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = from;
    loop {
        let Some(p) = text[i..].find('\n') else {
            return text.len();
        };
        let nl = i + p;
        let mut j = nl;
        if j > from && bytes[j - 1] == b'\r' {
            j -= 1;
        }
        if j > from && bytes[j - 1] == b'\\' {
            i = nl + 1;
        } else {
            return nl;
        }
    }
}

/// Join a directive tail's continuation lines into one trimmed string.
pub(crate) fn joined_tail(text: &str, from: usize, end: usize) -> String {
    text[from..end]
        .replace("\\\r\n", "")
        .replace("\\\n", "")
        .trim()
        .to_string()
}

/// One preprocessing run: walks the input once, left to right, feeding
/// directive-free chunks to a fresh expander each time.
pub(crate) struct Driver<'a> {
    pub(crate) table: &'a mut MacroTable,
    pub(crate) limit: usize,
}

impl<'a> Driver<'a> {
    pub fn new(table: &'a mut MacroTable, limit: usize) -> Self {
        Driver { table, limit }
    }

    /// Process `input` to completion. Called recursively on the chosen
    /// branch of each conditional block.
    pub fn process(&mut self, input: &str) -> Result<String, PreprocessError> {
        let mut out = String::new();
        let mut rest = input;
        while let Some(d) = find_directive(rest) {
            out.push_str(&self.expand_chunk(&rest[..d.start])?);
            if d.keyword.starts_with("if") {
                let (block, consumed) = condition::process_block(self, rest, &d)?;
                out.push_str(&block);
                rest = &rest[consumed..];
            } else if d.keyword.starts_with("undef") {
                let end = directive_end(rest, d.tail_start);
                self.table.undefine(&joined_tail(rest, d.tail_start, end));
                rest = &rest[end..];
            } else if d.keyword.starts_with("def") {
                let end = directive_end(rest, d.tail_start);
                self.table.define(&joined_tail(rest, d.tail_start, end))?;
                rest = &rest[end..];
            } else if d.keyword == "line" || d.keyword == "version" {
                let end = directive_end(rest, d.tail_start);
                let tail = joined_tail(rest, d.tail_start, end);
                if let Some(value) = leading_int(&tail) {
                    let name = if d.keyword == "line" {
                        "__LINE__"
                    } else {
                        "__VERSION__"
                    };
                    self.table.set_value(name, value.to_string());
                } else {
                    debug!("ignoring #{} {}", d.keyword, tail);
                }
                rest = &rest[end..];
            } else {
                // Unrecognized directive: emit it verbatim, unexpanded,
                // continuation lines included.
                let end = directive_end(rest, d.tail_start);
                out.push_str(&rest[d.start..end]);
                rest = &rest[end..];
            }
        }
        out.push_str(&self.expand_chunk(rest)?);
        Ok(out)
    }

    fn expand_chunk(&mut self, chunk: &str) -> Result<String, PreprocessError> {
        if chunk.is_empty() {
            return Ok(String::new());
        }
        Expander::new(self.table, self.limit).expand(chunk)
    }
}

/// Leading decimal integer of a tail, minus sign allowed.
fn leading_int(tail: &str) -> Option<i64> {
    let t = tail.trim_start();
    let bytes = t.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    t[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;

    fn run(input: &str) -> String {
        let config = PreprocessorConfig::new();
        let mut table = MacroTable::seeded(&config);
        Driver::new(&mut table, config.recursion_limit)
            .process(input)
            .unwrap()
    }

    #[test]
    fn finds_keyword_and_tail() {
        let d = find_directive("text\n#define A 1\nmore").unwrap();
        assert_eq!(d.start, 5);
        assert_eq!(d.keyword, "define");
        assert_eq!(&"text\n#define A 1\nmore"[d.tail_start..d.line_end], " A 1");
    }

    #[test]
    fn paste_operator_is_not_a_directive() {
        assert!(find_directive("a ## b").is_none());
        assert!(find_directive("a ##b").is_none());
        let d = find_directive("a ##b\n#end").unwrap();
        assert_eq!(d.keyword, "end");
    }

    #[test]
    fn continuation_lines_extend_the_directive() {
        let text = "#define A one \\\n  two\nrest";
        let d = find_directive(text).unwrap();
        let end = directive_end(text, d.tail_start);
        assert_eq!(&text[end..], "\nrest");
        assert_eq!(joined_tail(text, d.tail_start, end), "A one   two");
    }

    #[test]
    fn crlf_continuation() {
        let text = "#define A one \\\r\n  two\nrest";
        let d = find_directive(text).unwrap();
        let end = directive_end(text, d.tail_start);
        assert_eq!(joined_tail(text, d.tail_start, end), "A one   two");
    }

    #[test]
    fn define_then_expand() {
        assert_eq!(run("#define A 1\nA"), "\n1");
    }

    #[test]
    fn undef_stops_substitution() {
        assert_eq!(run("#define A 1\nA\n#undef A\nA"), "\n1\n\nA");
    }

    #[test]
    fn unknown_directive_passes_through_unexpanded() {
        assert_eq!(run("#define A 1\n#pragma once A"), "\n#pragma once A");
    }

    #[test]
    fn passthrough_keeps_continuation_lines() {
        let input = "#pragma do \\\n  more\nA";
        assert_eq!(run(input), "#pragma do \\\n  more\nA");
    }

    #[test]
    fn line_directive_updates_builtin() {
        assert_eq!(run("#line 42\n__LINE__"), "\n42");
        assert_eq!(run("__LINE__"), "0");
    }

    #[test]
    fn version_directive_with_junk_is_ignored() {
        assert_eq!(run("#version x\n__VERSION__"), "\n100");
    }

    #[test]
    fn leading_int_parsing() {
        assert_eq!(leading_int(" 42 core"), Some(42));
        assert_eq!(leading_int("-3"), Some(-3));
        assert_eq!(leading_int("-"), None);
        assert_eq!(leading_int("x"), None);
    }
}
