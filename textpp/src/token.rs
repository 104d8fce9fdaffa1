/// Check if a character can appear in a macro identifier. Macro names
/// follow the `[A-Za-z0-9_$]+` charset, so a name may start with a
/// digit; whole-identifier matching uses maximal runs of these.
pub(crate) const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Read the maximal identifier run starting at `start`, if any. The
/// run stops where an escape placeholder begins, so a hidden literal
/// glued to an identifier keeps its own token boundary.
pub(crate) fn ident_at(chars: &[char], start: usize) -> Option<String> {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        if end > start && crate::escape::EscapeTable::placeholder_len(chars, end).is_some() {
            break;
        }
        end += 1;
    }
    if end > start {
        Some(chars[start..end].iter().collect())
    } else {
        None
    }
}

/// Tokens of a `#if` / `#elif` condition expression
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExprToken {
    Number(i64),
    Identifier(String),
    LParen,
    RParen,
    Not,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}
