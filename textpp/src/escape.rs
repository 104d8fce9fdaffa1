//! Hides string/char/template literals and comments behind placeholder
//! tokens so substitution passes cannot rewrite text that must stay
//! verbatim, then restores them.

/// Ordered table of hidden literal/comment substrings.
///
/// Placeholders are `___string<N>` / `___comment<N>` with N counting
/// from 1 across both kinds. One table may be fed by several `hide`
/// calls; indices keep growing and a single `restore` at the end puts
/// everything back.
#[derive(Debug, Default)]
pub(crate) struct EscapeTable {
    entries: Vec<(String, String)>,
}

impl EscapeTable {
    /// Replace literals and comments in `text` with placeholders,
    /// appending the originals to the table in discovery order.
    ///
    /// Recognized forms: `//` to end of line, `/* */` (unterminated
    /// runs to end of input), and `'…'`, `"…"`, `` `…` `` matched
    /// non-greedily with no escaped-quote handling. An unterminated
    /// quote is left in place.
    pub fn hide(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if ch == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
                let mut j = i + 2;
                while j < chars.len() && chars[j] != '\n' {
                    j += 1;
                }
                out.push_str(&self.stash("___comment", &chars[i..j]));
                i = j;
            } else if ch == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
                let mut j = i + 2;
                while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                    j += 1;
                }
                let end = if j + 1 < chars.len() { j + 2 } else { chars.len() };
                out.push_str(&self.stash("___comment", &chars[i..end]));
                i = end;
            } else if ch == '"' || ch == '\'' || ch == '`' {
                match chars[i + 1..].iter().position(|&c| c == ch) {
                    Some(rel) => {
                        let end = i + 1 + rel + 1;
                        out.push_str(&self.stash("___string", &chars[i..end]));
                        i = end;
                    }
                    None => {
                        out.push(ch);
                        i += 1;
                    }
                }
            } else {
                out.push(ch);
                i += 1;
            }
        }
        out
    }

    /// Substitute every placeholder back with its original entry, in
    /// ascending index order, repeating until none remains (a hidden
    /// entry may itself contain an earlier placeholder). Returns the
    /// input unchanged when the table is empty.
    pub fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        for _ in 0..=self.entries.len() {
            let mut replaced = false;
            for (placeholder, original) in &self.entries {
                if out.contains(placeholder.as_str()) {
                    out = out.replace(placeholder.as_str(), original);
                    replaced = true;
                }
            }
            if !replaced {
                break;
            }
        }
        out
    }

    /// Length of the placeholder token starting at `chars[i]`, if one
    /// starts there. Scanners treat placeholders as atomic tokens so a
    /// hidden literal never merges with an adjacent identifier.
    pub fn placeholder_len(chars: &[char], i: usize) -> Option<usize> {
        for kind in ["___string", "___comment"] {
            let klen = kind.len();
            if chars.len() >= i + klen + 1
                && chars[i..i + klen].iter().collect::<String>() == kind
            {
                let mut end = i + klen;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                if end > i + klen {
                    return Some(end - i);
                }
            }
        }
        None
    }

    fn stash(&mut self, kind: &str, original: &[char]) -> String {
        let placeholder = format!("{}{}", kind, self.entries.len() + 1);
        self.entries
            .push((placeholder.clone(), original.iter().collect()));
        placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hides_and_restores_literals() {
        let mut table = EscapeTable::default();
        let hidden = table.hide("a \"one\" b 'two' c `three`");
        assert!(!hidden.contains("one"));
        assert!(!hidden.contains("two"));
        assert!(!hidden.contains("three"));
        assert_eq!(table.restore(&hidden), "a \"one\" b 'two' c `three`");
    }

    #[test]
    fn hides_comments_but_keeps_newlines() {
        let mut table = EscapeTable::default();
        let hidden = table.hide("x // note\ny /* block */ z");
        assert!(!hidden.contains("note"));
        assert!(!hidden.contains("block"));
        assert!(hidden.contains('\n'));
        assert_eq!(table.restore(&hidden), "x // note\ny /* block */ z");
    }

    #[test]
    fn unterminated_quote_left_alone() {
        let mut table = EscapeTable::default();
        assert_eq!(table.hide("it's fine"), "it's fine");
    }

    #[test]
    fn restore_on_empty_table_is_identity() {
        let table = EscapeTable::default();
        assert_eq!(table.restore("unchanged ___string1"), "unchanged ___string1");
    }

    #[test]
    fn repeated_hide_keeps_appending() {
        let mut table = EscapeTable::default();
        let first = table.hide("\"a\"");
        let second = table.hide(&format!("{first} \"b\""));
        assert_eq!(table.restore(&second), "\"a\" \"b\"");
    }

    #[test]
    fn placeholder_tokens_are_recognized() {
        let chars: Vec<char> = "x___comment12y".chars().collect();
        assert_eq!(EscapeTable::placeholder_len(&chars, 1), Some(12));
        assert_eq!(EscapeTable::placeholder_len(&chars, 0), None);
        let bare: Vec<char> = "___string".chars().collect();
        assert_eq!(EscapeTable::placeholder_len(&bare, 0), None);
    }

    #[test]
    fn nested_placeholder_in_entry_is_restored() {
        let mut table = EscapeTable::default();
        let first = table.hide("\"a\"");
        // A later pass quotes the placeholder itself, as stringification does.
        let quoted = table.hide(&format!("\"{first}\""));
        assert_eq!(table.restore(&quoted), "\"\"a\"\"");
    }
}
