use crate::command::ExitCode;

pub use crate::lexer::LexingError;
pub use crate::parser::ParsingError;

/// The capability set could not be registered into an interpreter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// A command with this name is already registered.
    #[error("duplicate capability `{0}`")]
    Duplicate(String),
    /// The name cannot be invoked from guest code.
    #[error("invalid capability name {0:?}")]
    InvalidName(String),
}

/// Evaluation of guest code failed.
///
/// Output written before the failure stays in the sinks.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The source text could not be tokenized.
    #[error("syntax error: {0}")]
    Lexing(#[from] LexingError),

    /// The source text could not be parsed.
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// No capability is registered under this name.
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// An input redirection named a file that does not exist.
    #[error("{0}: No such file")]
    MissingInput(String),

    /// A command reported an error.
    #[error("{command}: {message}")]
    Runtime {
        /// Name the command was invoked by.
        command: String,
        /// The command's error, including its causes.
        message: String,
    },

    /// A command panicked.
    #[error("panic: {0}")]
    Panic(String),

    /// The guest called `exit` with a non-zero status.
    #[error("exit status {0}")]
    Exit(ExitCode),

    /// Writing to an output destination failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            EvalError::from(LexingError::UnfinishedQuote).to_string(),
            "syntax error: unterminated quoted string"
        );
        assert_eq!(
            EvalError::from(ParsingError::UnexpectedEnd).to_string(),
            "syntax error: unexpected end of input"
        );
        assert_eq!(EvalError::Exit(3).to_string(), "exit status 3");
        assert_eq!(
            EvalError::Runtime {
                command: "grep".to_string(),
                message: "bad pattern".to_string(),
            }
            .to_string(),
            "grep: bad pattern"
        );
        assert_eq!(
            LoadError::Duplicate("echo".to_string()).to_string(),
            "duplicate capability `echo`"
        );
    }
}
