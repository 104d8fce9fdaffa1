//! The macro table and `#define`/`#undef` parsing.

use std::collections::HashMap;

use log::debug;

use crate::config::{InitialMacro, NativeMacro, PreprocessorConfig};
use crate::error::PreprocessError;
use crate::token::{ident_at, is_ident_char};

/// A single macro definition
#[derive(Clone)]
pub(crate) enum MacroDefinition {
    /// Raw replacement text, line-joined and trimmed
    Value(String),
    /// Fixed-arity function macro; arity is the parameter count
    Function { params: Vec<String>, body: String },
    /// Host-supplied function macro from the configuration; `None`
    /// arity means variadic (built-ins only)
    Native {
        arity: Option<usize>,
        func: NativeMacro,
    },
    /// The built-in `defined(name, …)` predicate, true iff every named
    /// macro is present in the table
    Defined,
}

impl MacroDefinition {
    /// Whether this macro is invoked with call syntax `NAME(args)`
    pub fn is_callable(&self) -> bool {
        !matches!(self, MacroDefinition::Value(_))
    }
}

/// Mapping from macro name to definition, scoped to one preprocessing
/// call. Mutated only by `#define`/`#undef` (and the `#line`/`#version`
/// built-in updates).
pub(crate) struct MacroTable {
    map: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    /// Build a table seeded with the built-ins and the configured
    /// initial macros.
    pub fn seeded(config: &PreprocessorConfig) -> Self {
        let mut table = MacroTable {
            map: HashMap::new(),
        };
        table.set_value("__LINE__", "0");
        table.set_value("__FILE__", config.file.clone());
        table.set_value("__VERSION__", "100");
        table
            .map
            .insert("defined".to_string(), MacroDefinition::Defined);
        for (name, init) in &config.defines {
            let def = match init {
                InitialMacro::Value(v) => MacroDefinition::Value(v.clone()),
                InitialMacro::Function { arity, func } => MacroDefinition::Native {
                    arity: Some(*arity),
                    func: func.clone(),
                },
            };
            table.map.insert(name.clone(), def);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Insert or overwrite a value macro.
    pub fn set_value<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) {
        self.map
            .insert(name.into(), MacroDefinition::Value(value.into()));
    }

    /// Handle a `#define` directive tail (continuations already
    /// joined). The name is the longest `[A-Za-z0-9_$]+` run; a `(`
    /// immediately after it (no whitespace) opens a parameter list and
    /// makes this a function macro, otherwise the remainder is the
    /// value. A later definition of the same name overwrites.
    pub fn define(&mut self, tail: &str) -> Result<(), PreprocessError> {
        let tail = tail.trim_start();
        let chars: Vec<char> = tail.chars().collect();
        let Some(name) = ident_at(&chars, 0) else {
            return Err(PreprocessError::MalformedDefinition(format!(
                "no macro name in \"#define {}\"",
                tail.trim()
            )));
        };
        let mut pos = name.chars().count();

        if pos < chars.len() && chars[pos] == '(' {
            let Some(close) = chars[pos..].iter().position(|&c| c == ')') else {
                return Err(PreprocessError::MalformedDefinition(format!(
                    "unterminated parameter list for macro \"{name}\""
                )));
            };
            let list: String = chars[pos + 1..pos + close].iter().collect();
            let params: Vec<String> = if list.trim().is_empty() {
                Vec::new()
            } else {
                list.split(',').map(|p| p.trim().to_string()).collect()
            };
            pos += close + 1;
            let body: String = chars[pos..].iter().collect::<String>().trim().to_string();
            debug!("define function macro {}({})", name, params.join(", "));
            self.map
                .insert(name, MacroDefinition::Function { params, body });
        } else {
            let value: String = chars[pos..].iter().collect::<String>().trim().to_string();
            if value.is_empty() {
                return Err(PreprocessError::MalformedDefinition(format!(
                    "macro \"{name}\" has no value"
                )));
            }
            debug!("define value macro {name} = {value}");
            self.map.insert(name, MacroDefinition::Value(value));
        }
        Ok(())
    }

    /// Handle a `#undef` directive tail: remove the first name token
    /// if present. Missing name or unknown macro is a no-op.
    pub fn undefine(&mut self, tail: &str) {
        let name: String = tail
            .trim_start()
            .chars()
            .take_while(|&c| !c.is_whitespace() && c != '(' && c != ')')
            .collect();
        if !name.is_empty() {
            debug!("undef {name}");
            self.map.remove(&name);
        }
    }

    /// First identifier of a directive tail, for `#ifdef`/`#ifndef`.
    pub fn first_name(tail: &str) -> Option<String> {
        let chars: Vec<char> = tail.chars().collect();
        let start = chars.iter().position(|&c| is_ident_char(c))?;
        ident_at(&chars, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MacroTable {
        MacroTable::seeded(&PreprocessorConfig::new())
    }

    #[test]
    fn builtins_are_seeded() {
        let t = table();
        assert!(t.contains("__LINE__"));
        assert!(t.contains("__FILE__"));
        assert!(t.contains("__VERSION__"));
        assert!(t.contains("defined"));
    }

    #[test]
    fn define_value_macro() {
        let mut t = table();
        t.define("PI 3.14").unwrap();
        match t.get("PI") {
            Some(MacroDefinition::Value(v)) => assert_eq!(v, "3.14"),
            _ => panic!("expected value macro"),
        }
    }

    #[test]
    fn define_function_macro() {
        let mut t = table();
        t.define("min(X, Y)  ((X) < (Y) ? (X) : (Y))").unwrap();
        match t.get("min") {
            Some(MacroDefinition::Function { params, body }) => {
                assert_eq!(params, &["X", "Y"]);
                assert_eq!(body, "((X) < (Y) ? (X) : (Y))");
            }
            _ => panic!("expected function macro"),
        }
    }

    #[test]
    fn space_before_paren_is_a_value_macro() {
        let mut t = table();
        t.define("lang_init ()    c_init()").unwrap();
        match t.get("lang_init") {
            Some(MacroDefinition::Value(v)) => assert_eq!(v, "()    c_init()"),
            _ => panic!("expected value macro"),
        }
    }

    #[test]
    fn empty_parameter_list() {
        let mut t = table();
        t.define("lang_init()  c_init()").unwrap();
        match t.get("lang_init") {
            Some(MacroDefinition::Function { params, .. }) => assert!(params.is_empty()),
            _ => panic!("expected function macro"),
        }
    }

    #[test]
    fn missing_name_is_malformed() {
        let mut t = table();
        assert!(matches!(
            t.define(""),
            Err(PreprocessError::MalformedDefinition(_))
        ));
    }

    #[test]
    fn empty_value_is_malformed() {
        let mut t = table();
        assert!(matches!(
            t.define("THING"),
            Err(PreprocessError::MalformedDefinition(_))
        ));
    }

    #[test]
    fn function_macro_body_may_be_empty() {
        let mut t = table();
        assert!(t.define("NOP()").is_ok());
    }

    #[test]
    fn redefinition_overwrites() {
        let mut t = table();
        t.define("A 1").unwrap();
        t.define("A 2").unwrap();
        match t.get("A") {
            Some(MacroDefinition::Value(v)) => assert_eq!(v, "2"),
            _ => panic!("expected value macro"),
        }
    }

    #[test]
    fn undef_unknown_name_is_a_noop() {
        let mut t = table();
        t.undefine("NEVER_DEFINED");
        t.undefine("");
    }
}
