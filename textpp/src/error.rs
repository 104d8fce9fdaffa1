use thiserror::Error;

/// Errors that can occur during preprocessing
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// `#define` with no parsable name, or a value macro with no value
    #[error("malformed definition: {0}")]
    MalformedDefinition(String),

    /// Function-macro call whose argument count does not match the
    /// declared parameter count
    #[error("macro \"{name}\" requires {expected} arguments, but {actual} given")]
    MacroArity {
        /// Name of the macro being invoked
        name: String,
        /// Declared arity
        expected: usize,
        /// Argument count at the call site
        actual: usize,
    },

    /// Macro expansion did not settle within the configured limit
    #[error("macro expansion exceeded recursion limit of {0}")]
    RecursionLimitExceeded(usize),
}
