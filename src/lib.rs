//! Run untrusted shell snippets in a fresh embedded interpreter and get
//! everything they printed back as one string.
//!
//! Guest code is written in a small shell language (pipelines, `&&`/`||`,
//! variables, command substitution, redirections) and can only call the
//! commands of a [`CapabilitySet`]. Nothing touches the host: files live in an
//! in-memory table and variables start out empty on every call.
//!
//! The main entry point is [`run_code`]. [`Interpreter`] is the embeddable
//! engine underneath it, and the [`command`] and [`env`] modules expose the
//! traits and types for writing your own capabilities.
//!
//! ```
//! let result = shell_bridge::run_code("echo one two | wc; cat nothing");
//! assert_eq!(result, "1 2 8\n\n--- STDERR ---\ncat: nothing: No such file\n");
//! ```

pub mod bridge;
mod builtin;
pub mod capability;
pub mod command;
pub mod env;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod io_adapters;
mod lexer;
mod parser;

pub use bridge::run_code;
pub use capability::CapabilitySet;
pub use error::{EvalError, LoadError};
pub use interpreter::{Interpreter, Options};
pub use io_adapters::CaptureBuffer;
