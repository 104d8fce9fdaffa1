//! Flattens the parenthesis structure of a string into an ordered list
//! of parts so top-level comma-separated argument lists can be read
//! without balancing parentheses at every call site.

/// Result of flattening: part 0 is the top-level text with each
/// balanced `(...)` group replaced by `(___<idx>)`; parts 1..N hold
/// each group's interior, which may itself contain nested markers.
///
/// A marker is only recognized as the whole parenthesized form
/// `(___<digits>)` with an index some group was actually stored at.
/// That keeps markers disjoint from ordinary text: a literal `___9`
/// has no enclosing parens, a literal `(___9)` is itself flattened
/// into a group whose interior starts at a part boundary, and the
/// escaper's `___string<N>` / `___comment<N>` placeholders carry no
/// digits after the underscores.
#[derive(Debug)]
pub(crate) struct Flattened {
    pub parts: Vec<String>,
}

/// Flatten `text` into parts. Unmatched parentheses are kept as
/// literal characters.
pub(crate) fn flatten(text: &str) -> Flattened {
    let mut flat = Flattened {
        parts: vec![String::new()],
    };
    let chars: Vec<char> = text.chars().collect();
    let top = scan(&chars, &mut flat);
    flat.parts[0] = top;
    flat
}

fn scan(chars: &[char], flat: &mut Flattened) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '(' {
            match matching_close(chars, i) {
                Some(close) => {
                    let interior = scan(&chars[i + 1..close], flat);
                    flat.parts.push(interior);
                    out.push_str(&format!("(___{})", flat.parts.len() - 1));
                    i = close + 1;
                }
                None => {
                    out.push('(');
                    i += 1;
                }
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

impl Flattened {
    /// Exact inverse of `flatten`.
    pub fn stringify(&self) -> String {
        self.resolve(&self.parts[0])
    }

    /// Resolve every group marker in `text` against the parts list,
    /// recursively. Text without markers, and marker-shaped text whose
    /// index no group was stored at, is returned unchanged.
    pub fn resolve(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some((before, idx, after)) = next_marker(rest) {
            out.push_str(before);
            if idx == 0 || idx >= self.parts.len() {
                // Not one of ours; keep the text as written.
                out.push_str(&rest[before.len()..rest.len() - after.len()]);
            } else {
                out.push_str(&self.resolve(&self.parts[idx]));
            }
            rest = after;
        }
        out.push_str(rest);
        out
    }
}

/// Find the next `___<digits>` run enclosed in parentheses, returning
/// the text before it, the parsed index and the text from the closing
/// parenthesis on. The index is not validated against a parts list.
pub(crate) fn next_marker(text: &str) -> Option<(&str, usize, &str)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(pos) = text[i..].find("___") {
        let start = i + pos;
        let digits_start = start + 3;
        let mut end = digits_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > digits_start
            && start > 0
            && bytes[start - 1] == b'('
            && end < bytes.len()
            && bytes[end] == b')'
        {
            let idx: usize = text[digits_start..end].parse().ok()?;
            return Some((&text[..start], idx, &text[end..]));
        }
        i = start + 3;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_text_is_part_zero() {
        let flat = flatten("no groups here");
        assert_eq!(flat.parts, vec!["no groups here".to_string()]);
        assert_eq!(flat.stringify(), "no groups here");
    }

    #[test]
    fn nested_groups_round_trip() {
        let src = "min (min (a, b), c);";
        let flat = flatten(src);
        assert_eq!(flat.stringify(), src);
        // Innermost group is pushed first.
        assert_eq!(flat.parts[1], "a, b");
        assert!(flat.parts[2].starts_with("min (___1)"));
    }

    #[test]
    fn top_level_commas_are_visible() {
        let flat = flatten("f(a(1,2), b)");
        let interior = &flat.parts[flat.parts.len() - 1];
        // Only the argument separator survives at this level.
        assert_eq!(interior.matches(',').count(), 1);
    }

    #[test]
    fn unmatched_parens_kept_literal() {
        assert_eq!(flatten("a ) b (").stringify(), "a ) b (");
        assert_eq!(flatten("a ) b (").parts.len(), 1);
    }

    #[test]
    fn marker_is_distinct_from_escape_placeholders() {
        assert!(next_marker("x (___string4) y").is_none());
        let (before, idx, after) = next_marker("x (___17) y").unwrap();
        assert_eq!((before, idx, after), ("x (", 17, ") y"));
    }

    #[test]
    fn marker_needs_enclosing_parentheses() {
        assert!(next_marker("x ___17 y").is_none());
        assert!(next_marker("(___17").is_none());
        assert!(next_marker("___17)").is_none());
    }

    #[test]
    fn marker_like_input_text_round_trips() {
        assert_eq!(flatten("a ___9 b").stringify(), "a ___9 b");
        assert_eq!(flatten("(___1) and ___0").stringify(), "(___1) and ___0");
    }

    #[test]
    fn foreign_marker_index_is_left_alone() {
        let flat = flatten("x");
        assert_eq!(flat.resolve("(___7) ok"), "(___7) ok");
        assert_eq!(flat.resolve("(___0)"), "(___0)");
    }
}
