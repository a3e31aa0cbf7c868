//! RawCSS style compiler
//!
//! The compiler is a boundary: the application resolver only needs a pure
//! function from `(source, variables)` to CSS. [`StyleCompiler`] is that
//! function; [`LessCompiler`] is the bundled implementation.
//!
//! # Contract
//!
//! - Deterministic: identical `(source, variables)` pairs give identical CSS
//! - Stateless: nothing from one call is visible to the next
//! - Variables override same-named root definitions in the source
//!
//! # Example
//!
//! ```rust
//! use rawcss_compiler::{LessCompiler, StyleCompiler, Variables};
//!
//! let mut vars = Variables::new();
//! vars.insert("c".to_string(), "green".to_string());
//!
//! let css = LessCompiler::new().compile("@c: blue; body{color:@c}", &vars).unwrap();
//! assert_eq!(css, "body{color:green}");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod less;

pub use error::CompileError;
pub use less::LessCompiler;

use indexmap::IndexMap;
use std::sync::Arc;

/// Ordered variable overrides, name → value, names without the leading `@`
pub type Variables = IndexMap<String, String>;

/// Compiles style-language source into CSS
pub trait StyleCompiler: Send + Sync {
    /// Compile `source` with `variables` overriding its root definitions
    ///
    /// # Errors
    /// Returns [`CompileError`] when the source cannot be compiled.
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError>;
}

impl<T: StyleCompiler + ?Sized> StyleCompiler for Arc<T> {
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError> {
        (**self).compile(source, variables)
    }
}

impl<T: StyleCompiler + ?Sized> StyleCompiler for &T {
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError> {
        (**self).compile(source, variables)
    }
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for compiling style sheets
    pub use crate::{CompileError, LessCompiler, StyleCompiler, Variables};
}
