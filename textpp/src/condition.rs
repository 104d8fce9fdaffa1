//! Conditional blocks and the `#if` expression evaluator.
//!
//! A block runs from an `#if`/`#ifdef`/`#ifndef` to the `#endif` at
//! the same nesting depth. The first clause whose condition holds is
//! recursively processed; every other clause is dropped. A block with
//! no `#endif` extends to the end of the input.

use log::debug;

use crate::driver::{DirectiveMatch, Driver, directive_end, find_directive, joined_tail};
use crate::error::PreprocessError;
use crate::expand::Expander;
use crate::macros::MacroTable;
use crate::token::{ExprToken, ident_at, is_ident_char};

/// Process the block opened by `d` inside `rest`. Returns the text the
/// block produces (chosen branch plus whatever followed the `#endif`
/// keyword on its line) and the byte offset where the driver resumes.
pub(crate) fn process_block(
    driver: &mut Driver<'_>,
    rest: &str,
    d: &DirectiveMatch,
) -> Result<(String, usize), PreprocessError> {
    let cond_end = directive_end(rest, d.tail_start);
    let first_tail = joined_tail(rest, d.tail_start, cond_end);

    // Locate the elif/else/endif markers at this block's depth.
    let mut pos = cond_end;
    let mut depth = 0usize;
    let mut elif_tails: Vec<usize> = Vec::new();
    let mut else_body: Option<usize> = None;
    let mut endif: Option<(usize, usize, usize)> = None;
    let mut cuts: Vec<usize> = Vec::new();
    while let Some(m) = find_directive(&rest[pos..]) {
        let start = pos + m.start;
        let tail_start = pos + m.tail_start;
        let line_end = pos + m.line_end;
        if m.keyword.starts_with("if") {
            depth += 1;
        } else if m.keyword == "endif" {
            if depth == 0 {
                endif = Some((start, tail_start, line_end));
                break;
            }
            depth -= 1;
        } else if depth == 0 && else_body.is_none() {
            if m.keyword == "elif" {
                elif_tails.push(tail_start);
                cuts.push(start);
            } else if m.keyword == "else" {
                else_body = Some(directive_end(rest, tail_start));
                cuts.push(start);
            }
        }
        pos = line_end;
    }

    let (endif_start, post, consumed) = match endif {
        Some((start, tail_start, line_end)) => {
            let post_end = if line_end < rest.len() {
                line_end + 1
            } else {
                rest.len()
            };
            (start, rest[tail_start..post_end].to_string(), post_end)
        }
        None => (rest.len(), String::new(), rest.len()),
    };
    cuts.push(endif_start);

    // Pick the branch.
    let first_true = match d.keyword.as_str() {
        "ifdef" | "ifndef" => {
            let defined = MacroTable::first_name(&first_tail)
                .is_some_and(|name| driver.table.contains(&name));
            (d.keyword == "ifndef") != defined
        }
        _ => holds(driver.table, driver.limit, &first_tail),
    };

    let mut chosen = None;
    if first_true {
        chosen = Some((cond_end, cuts[0]));
    } else {
        for (i, &tail_start) in elif_tails.iter().enumerate() {
            let tail_end = directive_end(rest, tail_start);
            let tail = joined_tail(rest, tail_start, tail_end);
            if holds(driver.table, driver.limit, &tail) {
                chosen = Some((tail_end, cuts[i + 1]));
                break;
            }
        }
        if chosen.is_none() {
            if let Some(body_start) = else_body {
                chosen = Some((body_start, endif_start));
            }
        }
    }

    let processed = match chosen {
        Some((from, to)) => driver.process(&rest[from..to])?,
        None => String::new(),
    };
    Ok((processed + &post, consumed))
}

/// Expand and evaluate one condition. Any failure, in expansion or in
/// evaluation, makes the clause false.
fn holds(table: &MacroTable, limit: usize, expr: &str) -> bool {
    let expanded = match Expander::new(table, limit).expand(expr) {
        Ok(text) => text,
        Err(err) => {
            debug!("condition \"{expr}\" failed to expand: {err}");
            return false;
        }
    };
    match evaluate(&expanded) {
        Ok(value) => value != 0,
        Err(err) => {
            debug!("condition \"{expr}\" did not evaluate: {err}");
            false
        }
    }
}

/// Evaluate an integer condition expression. Identifiers left after
/// expansion are undefined macros and count as 0.
fn evaluate(expr: &str) -> Result<i64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err("unexpected trailing tokens".to_string());
    }
    Ok(value)
}

fn tokenize(expr: &str) -> Result<Vec<ExprToken>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // A trailing comment ends the expression.
        if c == '/' && i + 1 < chars.len() && (chars[i + 1] == '/' || chars[i + 1] == '*') {
            break;
        }
        if c.is_ascii_digit() {
            let mut value: i64 = 0;
            while i < chars.len() && chars[i].is_ascii_digit() {
                value = value
                    .wrapping_mul(10)
                    .wrapping_add(i64::from(chars[i] as u8 - b'0'));
                i += 1;
            }
            tokens.push(ExprToken::Number(value));
            continue;
        }
        if is_ident_char(c) {
            let Some(name) = ident_at(&chars, i) else {
                break;
            };
            i += name.chars().count();
            tokens.push(ExprToken::Identifier(name));
            continue;
        }
        let next_is = |want: char, at: usize| at + 1 < chars.len() && chars[at + 1] == want;
        let token = match c {
            '(' => ExprToken::LParen,
            ')' => ExprToken::RParen,
            '+' => ExprToken::Plus,
            '-' => ExprToken::Minus,
            '*' => ExprToken::Multiply,
            '/' => ExprToken::Divide,
            '%' => ExprToken::Modulo,
            '!' if next_is('=', i) => {
                i += 1;
                ExprToken::NotEqual
            }
            '!' => ExprToken::Not,
            '=' if next_is('=', i) => {
                // Tolerate strict-equality spellings such as `===`.
                i += 1;
                while i + 1 < chars.len() && chars[i + 1] == '=' {
                    i += 1;
                }
                ExprToken::Equal
            }
            '<' if next_is('=', i) => {
                i += 1;
                ExprToken::LessEqual
            }
            '<' => ExprToken::Less,
            '>' if next_is('=', i) => {
                i += 1;
                ExprToken::GreaterEqual
            }
            '>' => ExprToken::Greater,
            '&' if next_is('&', i) => {
                i += 1;
                ExprToken::And
            }
            '|' if next_is('|', i) => {
                i += 1;
                ExprToken::Or
            }
            _ => return Err(format!("unexpected character '{c}'")),
        };
        tokens.push(token);
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<i64, String> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(ExprToken::Or)) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = i64::from(left != 0 || right != 0);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<i64, String> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Some(ExprToken::And)) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = i64::from(left != 0 && right != 0);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<i64, String> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(
                    t @ (ExprToken::Equal
                    | ExprToken::NotEqual
                    | ExprToken::Less
                    | ExprToken::LessEqual
                    | ExprToken::Greater
                    | ExprToken::GreaterEqual),
                ) => t.clone(),
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = i64::from(match op {
                ExprToken::Equal => left == right,
                ExprToken::NotEqual => left != right,
                ExprToken::Less => left < right,
                ExprToken::LessEqual => left <= right,
                ExprToken::Greater => left > right,
                _ => left >= right,
            });
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<i64, String> {
        let mut left = self.parse_multiplicative()?;
        loop {
            match self.peek() {
                Some(ExprToken::Plus) => {
                    self.pos += 1;
                    left = left.wrapping_add(self.parse_multiplicative()?);
                }
                Some(ExprToken::Minus) => {
                    self.pos += 1;
                    left = left.wrapping_sub(self.parse_multiplicative()?);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<i64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(ExprToken::Multiply) => {
                    self.pos += 1;
                    left = left.wrapping_mul(self.parse_unary()?);
                }
                Some(ExprToken::Divide) => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    if right == 0 {
                        return Err("division by zero".to_string());
                    }
                    left = left.wrapping_div(right);
                }
                Some(ExprToken::Modulo) => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    if right == 0 {
                        return Err("modulo by zero".to_string());
                    }
                    left = left.wrapping_rem(right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<i64, String> {
        match self.peek() {
            Some(ExprToken::Not) => {
                self.pos += 1;
                Ok(i64::from(self.parse_unary()? == 0))
            }
            Some(ExprToken::Minus) => {
                self.pos += 1;
                Ok(self.parse_unary()?.wrapping_neg())
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<i64, String> {
        match self.bump() {
            Some(ExprToken::Number(value)) => Ok(value),
            Some(ExprToken::Identifier(_)) => Ok(0),
            Some(ExprToken::LParen) => {
                let value = self.parse_or()?;
                match self.bump() {
                    Some(ExprToken::RParen) => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(evaluate("1 + 2 * 3"), Ok(7));
        assert_eq!(evaluate("(1 + 2) * 3"), Ok(9));
        assert_eq!(evaluate("7 % 4 - 1"), Ok(2));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(evaluate("1 < 2 && 3 >= 3"), Ok(1));
        assert_eq!(evaluate("0 || !0"), Ok(1));
        assert_eq!(evaluate("2 != 2"), Ok(0));
    }

    #[test]
    fn strict_equality_spelling() {
        assert_eq!(evaluate("1 === 1"), Ok(1));
    }

    #[test]
    fn undefined_identifier_counts_as_zero() {
        assert_eq!(evaluate("MISSING + 1"), Ok(1));
    }

    #[test]
    fn trailing_comment_is_dropped() {
        assert_eq!(evaluate("1 // DISPLAY > 5"), Ok(1));
        assert_eq!(evaluate("2 /* note"), Ok(2));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("1 % 0").is_err());
    }

    #[test]
    fn malformed_expressions_are_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("(1").is_err());
        assert!(evaluate("1 &").is_err());
    }

    #[test]
    fn negative_numbers() {
        assert_eq!(evaluate("-3 + 5"), Ok(2));
        assert_eq!(evaluate("!-1"), Ok(0));
    }
}
