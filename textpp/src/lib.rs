//! A C-preprocessor-style macro engine for plain text.
//!
//! `textpp` runs `#define`/`#undef`, conditional blocks
//! (`#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif`), stringification
//! (`#param`) and token pasting (`param ## param`) over any text,
//! without caring what language the text is written in. Directives it
//! does not recognize, such as `#include` or `#pragma`, pass through
//! untouched, and so does everything inside string literals and
//! comments.
//!
//! # Example
//!
//! ```
//! use textpp::{PreprocessorConfig, preprocess_with};
//!
//! let config = PreprocessorConfig::new().with_define("GREETING", "\"hello\"");
//! let out = preprocess_with("#define NAME world\nGREETING NAME", &config)?;
//! assert_eq!(out, "\n\"hello\" world");
//! # Ok::<(), textpp::PreprocessError>(())
//! ```
//!
//! Macros can also be backed by host closures through
//! [`PreprocessorConfig::with_function`]; they receive the raw argument
//! texts of each call site and return the replacement text.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

mod balanced;
mod condition;
mod config;
mod driver;
mod error;
mod escape;
mod expand;
mod macros;
mod token;

pub use config::{NativeMacro, PreprocessorConfig};
pub use error::PreprocessError;

use driver::Driver;
use macros::MacroTable;

/// A reusable preprocessor handle.
///
/// The handle only holds configuration; every [`process`] call seeds a
/// fresh macro table, so calls are independent and `#define`s never
/// leak from one input to the next.
///
/// [`process`]: Preprocessor::process
pub struct Preprocessor {
    config: PreprocessorConfig,
}

impl Preprocessor {
    /// Create a preprocessor with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PreprocessorConfig::new())
    }

    /// Create a preprocessor from an explicit configuration.
    #[must_use]
    pub fn with_config(config: PreprocessorConfig) -> Self {
        Preprocessor { config }
    }

    /// Run the full directive-and-expansion pipeline over `input`.
    pub fn process(&self, input: &str) -> Result<String, PreprocessError> {
        let mut table = MacroTable::seeded(&self.config);
        Driver::new(&mut table, self.config.recursion_limit).process(input)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Preprocess `input` with the default configuration.
pub fn preprocess<S: AsRef<str>>(input: S) -> Result<String, PreprocessError> {
    Preprocessor::new().process(input.as_ref())
}

/// Preprocess `input` with the given configuration.
pub fn preprocess_with<S: AsRef<str>>(
    input: S,
    config: &PreprocessorConfig,
) -> Result<String, PreprocessError> {
    Preprocessor::with_config(config.clone()).process(input.as_ref())
}
