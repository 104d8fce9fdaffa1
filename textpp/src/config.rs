use std::rc::Rc;

/// Type alias for a host-supplied function macro: receives the raw
/// argument texts in call order and returns the replacement text.
pub type NativeMacro = Rc<dyn Fn(&[String]) -> String>;

/// An initial macro supplied through the configuration
#[derive(Clone)]
pub(crate) enum InitialMacro {
    /// Literal replacement text
    Value(String),
    /// Fixed-arity host function
    Function { arity: usize, func: NativeMacro },
}

/// Configuration for one preprocessing call
///
/// The configuration is only read; every `process` call seeds a fresh
/// macro table from it, so one configuration can serve any number of
/// independent invocations.
#[derive(Clone)]
pub struct PreprocessorConfig {
    pub(crate) defines: Vec<(String, InitialMacro)>,
    /// Value of the `__FILE__` built-in
    pub file: String,
    /// Maximum recursion/iteration depth for macro expansion
    pub recursion_limit: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorConfig {
    /// Create an empty configuration with the default recursion limit
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
            file: String::new(),
            recursion_limit: 128,
        }
    }

    /// Pre-define a value macro
    #[must_use]
    pub fn with_define<S: Into<String>, V: Into<String>>(mut self, name: S, value: V) -> Self {
        self.defines
            .push((name.into(), InitialMacro::Value(value.into())));
        self
    }

    /// Pre-define a fixed-arity function macro backed by a host closure
    #[must_use]
    pub fn with_function<S, F>(mut self, name: S, arity: usize, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[String]) -> String + 'static,
    {
        self.defines.push((
            name.into(),
            InitialMacro::Function {
                arity,
                func: Rc::new(f),
            },
        ));
        self
    }

    /// Set the value reported by `__FILE__`
    #[must_use]
    pub fn with_file<S: Into<String>>(mut self, file: S) -> Self {
        self.file = file.into();
        self
    }

    /// Set the maximum recursion depth for macro expansion
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
}
