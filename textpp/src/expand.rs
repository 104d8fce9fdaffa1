//! Macro expansion over one directive-free chunk of text.
//!
//! Expansion alternates two passes until the text stops changing: a
//! function pass that rewrites `NAME(args)` call sites, and a value
//! pass that substitutes plain value macros. String and comment
//! literals are hidden behind placeholders for the whole run so no
//! pass can rewrite text inside them.

use std::collections::HashSet;

use log::trace;

use crate::balanced::{Flattened, flatten, next_marker};
use crate::error::PreprocessError;
use crate::escape::EscapeTable;
use crate::macros::{MacroDefinition, MacroTable};
use crate::token::{ident_at, is_ident_char};

/// Replacement texts for one identifier occurrence. `raw` is the
/// argument text as written (used by `#` and `##`), `expanded` the
/// fully expanded form (used everywhere else). Value macros carry the
/// same text in both.
pub(crate) struct Substitution {
    pub raw: String,
    pub expanded: String,
}

/// One expansion run against a frozen macro table.
pub(crate) struct Expander<'a> {
    table: &'a MacroTable,
    limit: usize,
    /// Names currently being expanded; call sites of these are left
    /// in place so self-referential macros terminate.
    active: HashSet<String>,
}

impl<'a> Expander<'a> {
    pub fn new(table: &'a MacroTable, limit: usize) -> Self {
        Expander {
            table,
            limit,
            active: HashSet::new(),
        }
    }

    /// Expand every macro in `input`.
    pub fn expand(&mut self, input: &str) -> Result<String, PreprocessError> {
        self.expand_at(input, 0)
    }

    fn expand_at(&mut self, input: &str, depth: usize) -> Result<String, PreprocessError> {
        if depth > self.limit {
            return Err(PreprocessError::RecursionLimitExceeded(self.limit));
        }
        let mut esc = EscapeTable::default();
        let mut text = normalize_defined(&esc.hide(input));
        for _ in 0..=self.limit {
            let before = text.clone();
            // Substituted macro values may have introduced new literals;
            // they must be hidden before any pass sees them.
            text = esc.hide(&text);
            text = self.function_pass(&text, depth)?;
            // The same for string literals built by stringification.
            text = esc.hide(&text);
            text = self.value_pass(&text);
            if text == before {
                return Ok(esc.restore(&text));
            }
        }
        Err(PreprocessError::RecursionLimitExceeded(self.limit))
    }

    /// Rewrite every function-macro call site once, outermost first.
    /// Parts consumed as argument lists are skipped so `#`/`##` see
    /// arguments exactly as written.
    fn function_pass(&mut self, text: &str, depth: usize) -> Result<String, PreprocessError> {
        let mut flat = flatten(text);
        let mut consumed: HashSet<usize> = HashSet::new();
        let order: Vec<usize> = std::iter::once(0)
            .chain((1..flat.parts.len()).rev())
            .collect();
        for idx in order {
            if idx != 0 && consumed.contains(&idx) {
                continue;
            }
            let part = std::mem::take(&mut flat.parts[idx]);
            let rewritten = self.expand_calls(&part, &flat, &mut consumed, depth)?;
            flat.parts[idx] = rewritten;
        }
        Ok(flat.stringify())
    }

    /// One left-to-right sweep over a flattened part. Each expanded
    /// call is spliced in place and scanning resumes after it, so the
    /// result of one call is never rescanned at this level.
    fn expand_calls(
        &mut self,
        part: &str,
        flat: &Flattened,
        consumed: &mut HashSet<usize>,
        depth: usize,
    ) -> Result<String, PreprocessError> {
        let mut chars: Vec<char> = part.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if let Some(len) = EscapeTable::placeholder_len(&chars, i) {
                i += len;
                continue;
            }
            if !is_ident_char(chars[i]) {
                i += 1;
                continue;
            }
            let Some(name) = ident_at(&chars, i) else {
                i += 1;
                continue;
            };
            let name_len = name.chars().count();
            let def = match self.table.get(&name) {
                Some(d) if d.is_callable() && !self.active.contains(&name) => d.clone(),
                _ => {
                    i += name_len;
                    continue;
                }
            };
            let mut k = i + name_len;
            while k < chars.len() && chars[k].is_whitespace() {
                k += 1;
            }
            let Some((group, close)) = call_group_at(&chars, k, flat.parts.len()) else {
                i += name_len;
                continue;
            };
            mark_consumed(flat, group, consumed);
            let interior = &flat.parts[group];
            let raw_args: Vec<String> = if interior.trim().is_empty() {
                Vec::new()
            } else {
                interior
                    .split(',')
                    .map(|piece| flat.resolve(piece).trim().to_string())
                    .collect()
            };
            trace!("expanding {}({})", name, raw_args.join(", "));
            let replacement = self.apply(&name, def, &raw_args, depth)?;
            let repl: Vec<char> = replacement.chars().collect();
            let repl_len = repl.len();
            chars.splice(i..=close, repl);
            i += repl_len;
        }
        Ok(chars.into_iter().collect())
    }

    fn apply(
        &mut self,
        name: &str,
        def: MacroDefinition,
        raw_args: &[String],
        depth: usize,
    ) -> Result<String, PreprocessError> {
        match def {
            MacroDefinition::Function { params, body } => {
                if raw_args.len() != params.len() {
                    return Err(PreprocessError::MacroArity {
                        name: name.to_string(),
                        expected: params.len(),
                        actual: raw_args.len(),
                    });
                }
                let mut expanded_args = Vec::with_capacity(raw_args.len());
                for arg in raw_args {
                    expanded_args.push(self.expand_at(arg, depth + 1)?);
                }
                // Parameters inside the body's own literals stay put.
                let mut body_esc = EscapeTable::default();
                let hidden = body_esc.hide(&body);
                let substituted = substitute_identifiers(&hidden, |ident| {
                    params.iter().position(|p| p == ident).map(|n| Substitution {
                        raw: raw_args[n].clone(),
                        expanded: expanded_args[n].clone(),
                    })
                });
                let substituted = body_esc.restore(&substituted);
                self.active.insert(name.to_string());
                let result = self.expand_at(&substituted, depth + 1);
                self.active.remove(name);
                result
            }
            MacroDefinition::Native { arity, func } => {
                if let Some(expected) = arity {
                    if raw_args.len() != expected {
                        return Err(PreprocessError::MacroArity {
                            name: name.to_string(),
                            expected,
                            actual: raw_args.len(),
                        });
                    }
                }
                let produced = func(raw_args);
                self.active.insert(name.to_string());
                let result = self.expand_at(&produced, depth + 1);
                self.active.remove(name);
                result
            }
            MacroDefinition::Defined => {
                let all = !raw_args.is_empty()
                    && raw_args.iter().all(|arg| {
                        let cs: Vec<char> = arg.chars().collect();
                        cs.iter()
                            .position(|&c| is_ident_char(c))
                            .and_then(|p| ident_at(&cs, p))
                            .is_some_and(|n| self.table.contains(&n))
                    });
                Ok(if all { "1" } else { "0" }.to_string())
            }
            MacroDefinition::Value(_) => {
                // expand_calls only dispatches callable definitions.
                debug_assert!(false, "value macro {name} dispatched as a call");
                Ok(String::new())
            }
        }
    }

    /// Substitute value macros everywhere outside hidden literals.
    fn value_pass(&self, text: &str) -> String {
        substitute_identifiers(text, |name| {
            if self.active.contains(name) {
                return None;
            }
            match self.table.get(name) {
                Some(MacroDefinition::Value(_)) => {
                    let value = self.resolve_value_chain(name);
                    Some(Substitution {
                        raw: value.clone(),
                        expanded: value,
                    })
                }
                _ => None,
            }
        })
    }

    /// Follow value macros whose entire value is the name of another
    /// value macro, so chains collapse in one pass. Stops at the first
    /// repeated name.
    fn resolve_value_chain(&self, name: &str) -> String {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = name;
        loop {
            seen.insert(current);
            let value = match self.table.get(current) {
                Some(MacroDefinition::Value(v)) => v,
                _ => return current.to_string(),
            };
            let next = value.trim();
            if !seen.contains(next)
                && matches!(self.table.get(next), Some(MacroDefinition::Value(_)))
            {
                current = next;
            } else {
                return value.clone();
            }
        }
    }
}

/// Pattern `(___<digits>)` starting at `k`: a flattened group used as
/// a call's argument list. The index must name a group that was
/// actually stored; marker-shaped input text fails the bounds check
/// and is not a call. Returns the group index and the position of the
/// closing parenthesis.
fn call_group_at(chars: &[char], k: usize, parts: usize) -> Option<(usize, usize)> {
    if k + 4 >= chars.len() || chars[k] != '(' {
        return None;
    }
    if chars[k + 1] != '_' || chars[k + 2] != '_' || chars[k + 3] != '_' {
        return None;
    }
    let mut d = k + 4;
    let mut idx = 0usize;
    while d < chars.len() && chars[d].is_ascii_digit() {
        idx = idx * 10 + (chars[d] as usize - '0' as usize);
        d += 1;
    }
    if d == k + 4 || d >= chars.len() || chars[d] != ')' {
        return None;
    }
    if idx == 0 || idx >= parts {
        return None;
    }
    Some((idx, d))
}

fn mark_consumed(flat: &Flattened, idx: usize, consumed: &mut HashSet<usize>) {
    if idx == 0 || idx >= flat.parts.len() || !consumed.insert(idx) {
        return;
    }
    let mut rest: &str = &flat.parts[idx];
    while let Some((_, inner, after)) = next_marker(rest) {
        mark_consumed(flat, inner, consumed);
        rest = after;
    }
}

/// Rewrite `defined NAME` to `defined(NAME)` so the function pass sees
/// a uniform call form. `defined(` and `defined (` are left alone.
pub(crate) fn normalize_defined(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some(len) = EscapeTable::placeholder_len(&chars, i) {
            out.extend(chars[i..i + len].iter());
            i += len;
            continue;
        }
        if is_ident_char(chars[i]) {
            let Some(name) = ident_at(&chars, i) else {
                break;
            };
            let name_len = name.chars().count();
            if name == "defined" {
                let mut k = i + name_len;
                while k < chars.len() && (chars[k] == ' ' || chars[k] == '\t') {
                    k += 1;
                }
                if k > i + name_len
                    && k < chars.len()
                    && is_ident_char(chars[k])
                    && EscapeTable::placeholder_len(&chars, k).is_none()
                {
                    if let Some(arg) = ident_at(&chars, k) {
                        out.push_str("defined(");
                        out.push_str(&arg);
                        out.push(')');
                        i = k + arg.chars().count();
                        continue;
                    }
                }
            }
            out.push_str(&name);
            i += name_len;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Scan `text` for identifier tokens and replace those the resolver
/// recognizes. A replaced token adjacent to `##` pastes its raw text
/// with the neighbor (the `##` is removed); one preceded by a single
/// `#` becomes a quoted string of its raw text; anything else takes
/// the expanded text. `#` and `##` next to unreplaced tokens are
/// ordinary characters and pass through untouched.
pub(crate) fn substitute_identifiers<F>(text: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<Substitution>,
{
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    // Set when the previous replaced token consumed a trailing `##`.
    let mut pasted_left = false;
    while i < chars.len() {
        if let Some(len) = EscapeTable::placeholder_len(&chars, i) {
            out.extend(chars[i..i + len].iter());
            i += len;
            pasted_left = false;
            continue;
        }
        if !is_ident_char(chars[i]) {
            out.push(chars[i]);
            i += 1;
            pasted_left = false;
            continue;
        }
        let Some(name) = ident_at(&chars, i) else {
            break;
        };
        let name_len = name.chars().count();
        let Some(sub) = resolve(&name) else {
            out.push_str(&name);
            i += name_len;
            pasted_left = false;
            continue;
        };

        let mut left = pasted_left;
        if !left && ends_with_paste(&out) {
            trim_paste_left(&mut out);
            left = true;
        }
        let stringified = !left && out.ends_with('#') && !out.ends_with("##");
        if stringified {
            out.pop();
        }
        // Look ahead for a `##` binding this token to the next one.
        let mut next = i + name_len;
        let mut right = false;
        let mut m = next;
        while m < chars.len() && chars[m].is_whitespace() {
            m += 1;
        }
        if m + 1 < chars.len() && chars[m] == '#' && chars[m + 1] == '#' {
            next = m + 2;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            right = true;
        }

        if stringified {
            out.push_str(&quote(&sub.raw));
        } else if left || right {
            out.push_str(&sub.raw);
        } else {
            out.push_str(&sub.expanded);
        }
        pasted_left = right;
        i = next;
    }
    out
}

fn ends_with_paste(out: &str) -> bool {
    out.trim_end().ends_with("##")
}

fn trim_paste_left(out: &mut String) {
    while out.ends_with(|c: char| c.is_whitespace()) {
        out.pop();
    }
    out.pop();
    out.pop();
    while out.ends_with(|c: char| c.is_whitespace()) {
        out.pop();
    }
}

/// Quote `raw` as a string literal the way stringification requires.
fn quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessorConfig;

    fn expand_with(defines: &[&str], input: &str) -> Result<String, PreprocessError> {
        let config = PreprocessorConfig::new();
        let mut table = MacroTable::seeded(&config);
        for d in defines {
            table.define(d).unwrap();
        }
        Expander::new(&table, config.recursion_limit).expand(input)
    }

    fn expand(defines: &[&str], input: &str) -> String {
        expand_with(defines, input).unwrap()
    }

    #[test]
    fn marker_like_identifiers_are_not_arguments() {
        assert_eq!(expand(&[], "a ___9 b"), "a ___9 b");
        assert_eq!(
            expand(&["f(x) x"], "f(a) and ___1 here"),
            "a and ___1 here"
        );
    }

    #[test]
    fn literal_introduced_by_value_macro_stays_hidden() {
        assert_eq!(
            expand(&["s(x) 9", "A \"s(1)\""], "A"),
            "\"s(1)\""
        );
    }

    #[test]
    fn value_macro_substitution() {
        assert_eq!(
            expand(&["BUFSIZE 1024"], "char buf[BUFSIZE];"),
            "char buf[1024];"
        );
    }

    #[test]
    fn value_chain_collapses() {
        assert_eq!(
            expand(&["ONE 1", "TWO ONE", "THREE TWO"], "THREE"),
            "1"
        );
    }

    #[test]
    fn function_macro_call() {
        assert_eq!(
            expand(
                &["min(X, Y)  ((X) < (Y) ? (X) : (Y))"],
                "min (a, b);"
            ),
            "((a) < (b) ? (a) : (b));"
        );
    }

    #[test]
    fn nested_call_in_argument() {
        assert_eq!(
            expand(
                &["min(X, Y)  ((X) < (Y) ? (X) : (Y))"],
                "min (min (a, b), c);"
            ),
            "((((a) < (b) ? (a) : (b))) < (c) ? (((a) < (b) ? (a) : (b))) : (c));"
        );
    }

    #[test]
    fn call_inside_plain_parentheses() {
        assert_eq!(
            expand(&["twice(X) ((X) + (X))"], "a = (twice(2));"),
            "a = (((2) + (2)));"
        );
    }

    #[test]
    fn empty_string_arguments() {
        assert_eq!(
            expand(
                &["min(X, Y)  ((X) < (Y) ? (X) : (Y))"],
                "min (, b);"
            ),
            "(() < (b) ? () : (b));"
        );
    }

    #[test]
    fn parenthesized_comma_is_one_argument() {
        assert_eq!(
            expand(
                &["min(X, Y)  ((X) < (Y) ? (X) : (Y))"],
                "min ((,),);"
            ),
            "(((,)) < () ? ((,)) : ());"
        );
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let err = expand_with(
            &["min(X, Y)  ((X) < (Y) ? (X) : (Y))"],
            "min (a);",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::MacroArity { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn macro_name_without_call_is_untouched() {
        assert_eq!(expand(&["NOP() done"], "x = NOP;"), "x = NOP;");
    }

    #[test]
    fn literals_are_not_expanded() {
        assert_eq!(
            expand(&["foo 4"], "foo \"foo\" 'foo' // foo"),
            "4 \"foo\" 'foo' // foo"
        );
    }

    #[test]
    fn stringify_uses_the_unexpanded_argument() {
        let defines = ["foo 4", "str(s) #s", "xstr(s) str(s)"];
        assert_eq!(expand(&defines, "str (foo)"), "\"foo\"");
        assert_eq!(expand(&defines, "xstr (foo)"), "\"4\"");
    }

    #[test]
    fn stringify_keeps_embedded_literals_verbatim() {
        // The inner literal is hidden while `#` is applied, so its
        // quotes are not escaped.
        assert_eq!(expand(&["str(s) #s"], "str (p = \"x\")"), "\"p = \"x\"\"");
    }

    #[test]
    fn stringify_and_paste_in_one_body() {
        assert_eq!(
            expand(
                &["COMMAND(NAME)  { #NAME, NAME ## _command }"],
                "COMMAND (quit)"
            ),
            "{ \"quit\", quit_command }"
        );
    }

    #[test]
    fn chained_paste() {
        assert_eq!(expand(&["glue(a, b, c) a ## b ## c"], "glue(x, y, z)"), "xyz");
    }

    #[test]
    fn paste_between_plain_tokens_is_left_alone() {
        assert_eq!(expand(&[], "a ## b"), "a ## b");
    }

    #[test]
    fn stringified_literal_in_body() {
        assert_eq!(
            expand(
                &["WARN_IF(EXP)  do { if (EXP) fprintf (stderr, \"Warning: \" #EXP \"\\n\"); } while (0)"],
                "WARN_IF (x == 0);"
            ),
            "do { if (x == 0) fprintf (stderr, \"Warning: \" \"x == 0\" \"\\n\"); } while (0);"
        );
    }

    #[test]
    fn defined_predicate() {
        assert_eq!(expand(&["FLAG on"], "defined(FLAG)"), "1");
        assert_eq!(expand(&["FLAG on"], "defined FLAG"), "1");
        assert_eq!(expand(&[], "defined(FLAG)"), "0");
    }

    #[test]
    fn self_referential_macro_terminates() {
        assert_eq!(expand(&["f(x) f(x)"], "f(a)"), "f(a)");
    }

    #[test]
    fn growing_macro_hits_the_limit() {
        let err = expand_with(&["f(x) x f(x)"], "f(a)").unwrap_err();
        assert!(matches!(err, PreprocessError::RecursionLimitExceeded(_)));
    }

    #[test]
    fn comment_does_not_merge_with_identifier() {
        assert_eq!(
            expand(&["BUFSIZE 1024"], "BUFSIZE// tail"),
            "1024// tail"
        );
    }
}
