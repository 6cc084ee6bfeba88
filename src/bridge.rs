//! Evaluate one piece of guest code and fold everything it produced into a
//! single string.
//!
//! Every call builds its own interpreter and its own output buffers, so no
//! state leaks from one call into the next.

use crate::capability::CapabilitySet;
use crate::error::{EvalError, LoadError};
use crate::interpreter::{Interpreter, Options};
use crate::io_adapters::CaptureBuffer;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

/// Separates guest stdout from guest stderr in the combined result.
pub const STDERR_DELIMITER: &str = "\n--- STDERR ---\n";
/// Separates captured output from the evaluation failure message.
pub const ERROR_DELIMITER: &str = "\n--- ERROR ---\n";
/// Returned in front of the message when the capability set cannot be loaded.
pub const LOAD_ERROR_PREFIX: &str = "Error loading standard library: ";

static STANDARD: LazyLock<CapabilitySet> = LazyLock::new(CapabilitySet::standard);

/// Everything one evaluation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub stdout: String,
    pub stderr: String,
    /// Message of the evaluation failure, if any.
    pub error: Option<String>,
}

impl Execution {
    /// Combine the parts: stdout, then stderr if any, then the failure if any.
    pub fn render(&self) -> String {
        let mut result = self.stdout.clone();
        if !self.stderr.is_empty() {
            result.push_str(STDERR_DELIMITER);
            result.push_str(&self.stderr);
        }
        if let Some(error) = &self.error {
            result.push_str(ERROR_DELIMITER);
            result.push_str(error);
        }
        result
    }
}

/// Evaluate `code` in a fresh interpreter that has `capabilities` loaded.
///
/// Only a failure to load the capabilities is an `Err`; evaluation failures
/// are reported in [`Execution::error`].
///
/// A panicking command is reported as an evaluation failure only where
/// unwinding is available. On `wasm32-unknown-unknown` panics abort, so the
/// builtins must not panic on any guest input.
pub fn execute(code: &str, capabilities: &CapabilitySet) -> Result<Execution, LoadError> {
    let stdout = CaptureBuffer::new();
    let stderr = CaptureBuffer::new();

    let mut interpreter = Interpreter::new(Options::new(stdout.clone(), stderr.clone()));
    interpreter.use_capabilities(capabilities)?;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| interpreter.eval(code)))
        .unwrap_or_else(|payload| Err(EvalError::Panic(panic_message(payload.as_ref()))));
    drop(interpreter);

    let error = match outcome {
        Ok(status) => {
            tracing::debug!(status, "evaluation finished");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "evaluation failed");
            Some(e.to_string())
        }
    };

    Ok(Execution {
        stdout: stdout.drain(),
        stderr: stderr.drain(),
        error,
    })
}

/// Like [`run_code`], with an explicit capability set.
pub fn run_code_with(code: &str, capabilities: &CapabilitySet) -> String {
    match execute(code, capabilities) {
        Ok(execution) => execution.render(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load capabilities");
            format!("{LOAD_ERROR_PREFIX}{e}")
        }
    }
}

/// Run guest code with the standard capability set and return its combined
/// output.
///
/// Never fails: load and evaluation errors are folded into the string.
///
/// ```
/// assert_eq!(shell_bridge::run_code("echo hi"), "hi\n");
/// assert_eq!(
///     shell_bridge::run_code("echo oops >&2"),
///     "\n--- STDERR ---\noops\n"
/// );
/// ```
pub fn run_code(code: &str) -> String {
    run_code_with(code, &STANDARD)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
    use crate::env::Environment;

    #[test]
    fn test_stdout_only() {
        assert_eq!(run_code("echo hello"), "hello\n");
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(run_code(""), "");
    }

    #[test]
    fn test_stdout_and_stderr() {
        assert_eq!(run_code("echo out; echo err >&2"), "out\n\n--- STDERR ---\nerr\n");
    }

    #[test]
    fn test_stderr_only() {
        assert_eq!(
            run_code("cat missing"),
            "\n--- STDERR ---\ncat: missing: No such file\n"
        );
    }

    #[test]
    fn test_failure_keeps_partial_output() {
        assert_eq!(
            run_code("echo partial\nnosuchcommand"),
            "partial\n\n--- ERROR ---\ncommand not found: nosuchcommand"
        );
    }

    #[test]
    fn test_stderr_and_failure() {
        assert_eq!(
            run_code("echo a; echo b >&2; exit 4"),
            "a\n\n--- STDERR ---\nb\n\n--- ERROR ---\nexit status 4"
        );
    }

    #[test]
    fn test_syntax_error_without_output() {
        assert_eq!(
            run_code("echo 'open"),
            "\n--- ERROR ---\nsyntax error: unterminated quoted string"
        );
    }

    #[test]
    fn test_nonzero_status_is_not_a_failure() {
        assert_eq!(run_code("false; echo $?"), "1\n");
    }

    #[test]
    fn test_calls_are_isolated() {
        assert_eq!(run_code("X=1; echo data > f"), "");
        assert_eq!(
            run_code("echo \"[$X]\"; cat f"),
            "[]\n\n--- STDERR ---\ncat: f: No such file\n"
        );
    }

    #[test]
    fn test_repeated_calls_give_the_same_result() {
        let code = "X=$(echo a b | wc)\necho \"$X\" >> log\n\
                    false; echo $? >> log\ncat log; cat gone";
        let first = run_code(code);
        assert_eq!(first, "1 2 4\n1\n\n--- STDERR ---\ncat: gone: No such file\n");
        assert_eq!(run_code(code), first);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_huge_grep_context() {
        assert_eq!(run_code("echo x | grep -A 18446744073709551615 x"), "x\n");
    }

    #[test]
    fn test_delimiters_in_guest_output_are_not_escaped() {
        assert_eq!(run_code("echo -- '--- ERROR ---'"), "--- ERROR ---\n");
    }

    #[test]
    fn test_load_failure() {
        let set = CapabilitySet::standard().with(|| Box::new(Named("echo")));
        assert_eq!(
            run_code_with("echo never", &set),
            "Error loading standard library: duplicate capability `echo`"
        );
    }

    struct Boom;

    impl ExecutableCommand for Boom {
        fn execute(
            self: Box<Self>,
            _io: Streams<'_>,
            _env: &mut Environment,
        ) -> anyhow::Result<ExitCode> {
            panic!("kaboom")
        }
    }

    struct Named(&'static str);

    impl CommandFactory for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn create(&self, _env: &Environment, _args: &[&str]) -> Box<dyn ExecutableCommand> {
            Box::new(Boom)
        }
    }

    #[test]
    fn test_panicking_command_is_reported() {
        let set = CapabilitySet::standard().with(|| Box::new(Named("boom")));
        let execution = execute("echo before; boom; echo after", &set).unwrap();
        assert_eq!(execution.stdout, "before\n");
        assert_eq!(execution.error.as_deref(), Some("panic: kaboom"));
    }

    #[test]
    fn test_render_parts() {
        let execution = Execution {
            stdout: String::new(),
            stderr: "warn\n".to_string(),
            error: Some("bad".to_string()),
        };
        assert_eq!(execution.render(), "\n--- STDERR ---\nwarn\n\n--- ERROR ---\nbad");
        assert_eq!(Execution::default().render(), "");
    }
}
