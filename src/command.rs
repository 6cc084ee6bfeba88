use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};

/// Conventional exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// The three streams a command runs against.
///
/// `stdin` is fed by the previous pipeline stage or an input redirection,
/// `stdout` goes to the next stage, a redirection target or the interpreter's
/// output sink, and `stderr` always ends up in the interpreter's error sink.
pub struct Streams<'a> {
    /// Command input.
    pub stdin: &'a mut dyn Read,
    /// Command output.
    pub stdout: &'a mut dyn Write,
    /// Diagnostics.
    pub stderr: &'a mut dyn Write,
}

/// Object-safe trait for any command that can be executed by the interpreter.
///
/// Returning `Err` aborts the whole evaluation; per-operand problems should be
/// reported on `stderr` together with a non-zero exit code instead.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(self: Box<Self>, io: Streams<'_>, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that creates a command instance from its arguments.
///
/// Every factory is registered under exactly one [`name`](CommandFactory::name).
pub trait CommandFactory {
    /// Name the command is invoked by.
    fn name(&self) -> &str;

    /// Create a command instance for the provided arguments.
    fn create(&self, env: &Environment, args: &[&str]) -> Box<dyn ExecutableCommand>;
}
