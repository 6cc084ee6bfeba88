use crate::capability::CapabilitySet;
use crate::command::{CommandFactory, ExitCode, Streams};
use crate::env::Environment;
use crate::error::{EvalError, LoadError};
use crate::io_adapters::MemReader;
use crate::lexer::{self, WordPart};
use crate::parser::{self, AstNode, Connector, RedirectKind, Word};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};

/// Output destinations of an [`Interpreter`].
///
/// They are consumed by [`Interpreter::new`] and cannot be changed afterwards;
/// construct a new interpreter to write somewhere else.
pub struct Options {
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Options {
    /// Wire guest stdout and stderr to the given writers.
    pub fn new(stdout: impl Write + 'static, stderr: impl Write + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }
}

/// An embeddable interpreter for a small shell language.
///
/// A fresh interpreter knows no commands; load a [`CapabilitySet`] before
/// evaluating anything. State (variables, in-memory files, the last exit
/// status) lives as long as the interpreter does.
///
/// Example
/// ```
/// use shell_bridge::{CapabilitySet, CaptureBuffer, Interpreter, Options};
///
/// let stdout = CaptureBuffer::new();
/// let mut sh = Interpreter::new(Options::new(stdout.clone(), std::io::sink()));
/// sh.use_capabilities(&CapabilitySet::standard()).unwrap();
/// sh.eval("echo hello world | wc").unwrap();
/// drop(sh);
/// assert_eq!(stdout.drain(), "1 2 12\n");
/// ```
pub struct Interpreter {
    runtime: Runtime,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Interpreter {
    /// Create an interpreter writing to the destinations in `options`.
    pub fn new(options: Options) -> Self {
        Self {
            runtime: Runtime {
                env: Environment::new(),
                commands: HashMap::new(),
            },
            stdout: options.stdout,
            stderr: options.stderr,
        }
    }

    /// Register every capability of `set`.
    ///
    /// Either all capabilities are registered or, on error, none are.
    pub fn use_capabilities(&mut self, set: &CapabilitySet) -> Result<(), LoadError> {
        let factories: Vec<Box<dyn CommandFactory>> = set.instantiate().collect();

        let mut seen = HashSet::new();
        for factory in &factories {
            let name = factory.name();
            if !is_command_name(name) {
                return Err(LoadError::InvalidName(name.to_string()));
            }
            if self.runtime.commands.contains_key(name) || !seen.insert(name) {
                return Err(LoadError::Duplicate(name.to_string()));
            }
        }

        tracing::debug!(count = factories.len(), "loading capabilities");
        for factory in factories {
            self.runtime.commands.insert(factory.name().to_string(), factory);
        }
        Ok(())
    }

    /// Evaluate guest source text to completion.
    ///
    /// Returns the status of the last command. Empty input is a successful
    /// no-op. Output written before an error stays in the sinks.
    pub fn eval(&mut self, source: &str) -> Result<ExitCode, EvalError> {
        tracing::debug!(source_len = source.len(), "evaluating");
        let tokens = lexer::split_into_tokens(source)?;
        let ast = parser::construct_ast(tokens)?;

        let Self {
            runtime,
            stdout,
            stderr,
        } = self;
        let result = runtime.execute(&ast, stdout.as_mut(), stderr.as_mut());
        stdout.flush()?;
        stderr.flush()?;
        let status = result?;

        match runtime.env.exit_requested.take() {
            Some(0) => Ok(0),
            Some(code) => Err(EvalError::Exit(code)),
            None => Ok(status),
        }
    }

    /// Run a single registered command with already expanded arguments.
    ///
    /// An `exit` run this way only reports its status; it does not affect
    /// later evaluations.
    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExitCode, EvalError> {
        let Self {
            runtime,
            stdout,
            stderr,
        } = self;
        let result = runtime.invoke(
            name,
            args,
            None,
            &OutputTarget::Inherit,
            stdout.as_mut(),
            stderr.as_mut(),
        );
        // nothing is left to stop, a later `eval` starts clean
        runtime.env.exit_requested = None;
        result
    }
}

/// Where a command's stdout goes after redirections are applied.
enum OutputTarget {
    Inherit,
    Stderr,
    /// Already truncated or created while redirections were resolved.
    File(String),
}

struct Runtime {
    env: Environment,
    commands: HashMap<String, Box<dyn CommandFactory>>,
}

impl Runtime {
    fn execute(
        &mut self,
        node: &AstNode,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<ExitCode, EvalError> {
        match node {
            AstNode::Script(statements) => {
                let mut status = 0;
                for statement in statements {
                    status = self.execute(statement, out, err)?;
                    if self.env.exit_requested.is_some() {
                        break;
                    }
                }
                Ok(status)
            }
            AstNode::AndOr { first, rest } => {
                let mut status = self.execute(first, out, err)?;
                for (connector, node) in rest {
                    if self.env.exit_requested.is_some() {
                        break;
                    }
                    let run = match connector {
                        Connector::And => status == 0,
                        Connector::Or => status != 0,
                    };
                    if run {
                        status = self.execute(node, out, err)?;
                    }
                }
                Ok(status)
            }
            AstNode::Pipeline(commands) => {
                let mut previous_output: Option<Vec<u8>> = None;
                let mut status = 0;
                // `exit` in a stage of a multi-command pipeline only ends that stage
                let stages_are_scoped = commands.len() > 1;

                for (i, node) in commands.iter().enumerate() {
                    if i + 1 == commands.len() {
                        status = self.run_command(node, previous_output.take(), out, err)?;
                    } else {
                        let mut captured = Vec::new();
                        status =
                            self.run_command(node, previous_output.take(), &mut captured, err)?;
                        previous_output = Some(captured);
                    }
                    if stages_are_scoped {
                        self.env.exit_requested = None;
                    }
                }
                Ok(status)
            }
            AstNode::Command { .. } => self.run_command(node, None, out, err),
            // only ever nested inside a Command
            AstNode::Assignment { .. } | AstNode::Redirect { .. } => Ok(self.env.last_status),
        }
    }

    fn run_command(
        &mut self,
        node: &AstNode,
        input: Option<Vec<u8>>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<ExitCode, EvalError> {
        let AstNode::Command {
            argv,
            assignments,
            redirects,
        } = node
        else {
            return self.execute(node, out, err);
        };

        let mut bindings = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if let AstNode::Assignment { name, value } = assignment {
                let value = match value {
                    Some(word) => self.expand_word(word, err)?,
                    None => String::new(),
                };
                bindings.push((name.clone(), value));
            }
        }

        let mut words = Vec::with_capacity(argv.len());
        for word in argv {
            words.push(self.expand_word(word, err)?);
        }

        let mut redirected_input = None;
        let mut target = OutputTarget::Inherit;
        for redirect in redirects {
            if let AstNode::Redirect { kind, target: word } = redirect {
                let name = self.expand_word(word, err)?;
                match kind {
                    RedirectKind::Input => match self.env.read_file(&name) {
                        Some(data) => redirected_input = Some(data.to_vec()),
                        None => return Err(EvalError::MissingInput(name)),
                    },
                    RedirectKind::Output | RedirectKind::Append => {
                        // every target is created, only the last one receives output
                        self.env.write_file(&name, b"", *kind == RedirectKind::Append);
                        target = OutputTarget::File(name);
                    }
                    RedirectKind::ToStderr => target = OutputTarget::Stderr,
                }
            }
        }

        let Some((name, args)) = words.split_first() else {
            // bare assignments persist for the rest of the evaluation
            for (key, value) in bindings {
                self.env.set_var(key, value);
            }
            self.env.last_status = 0;
            return Ok(0);
        };

        let saved: Vec<(String, Option<String>)> = bindings
            .into_iter()
            .map(|(key, value)| {
                let previous = self.env.vars.insert(key.clone(), value);
                (key, previous)
            })
            .collect();

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.invoke(name, &args, redirected_input.or(input), &target, out, err);

        for (key, previous) in saved.into_iter().rev() {
            match previous {
                Some(value) => self.env.set_var(key, value),
                None => {
                    self.env.remove_var(&key);
                }
            }
        }

        result
    }

    fn invoke(
        &mut self,
        name: &str,
        args: &[&str],
        input: Option<Vec<u8>>,
        target: &OutputTarget,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<ExitCode, EvalError> {
        let cmd = match self.commands.get(name) {
            Some(factory) => factory.create(&self.env, args),
            None => return Err(EvalError::CommandNotFound(name.to_string())),
        };
        tracing::trace!(command = name, ?args, "executing");

        let mut stdin: Box<dyn Read> = match input {
            Some(buf) => Box::new(MemReader::new(buf)),
            None => Box::new(io::empty()),
        };

        let result = match target {
            OutputTarget::Inherit => cmd.execute(
                Streams {
                    stdin: stdin.as_mut(),
                    stdout: out,
                    stderr: &mut *err,
                },
                &mut self.env,
            ),
            OutputTarget::Stderr => {
                let mut captured = Vec::new();
                let result = cmd.execute(
                    Streams {
                        stdin: stdin.as_mut(),
                        stdout: &mut captured,
                        stderr: &mut *err,
                    },
                    &mut self.env,
                );
                err.write_all(&captured)?;
                result
            }
            OutputTarget::File(file) => {
                let mut captured = Vec::new();
                let result = cmd.execute(
                    Streams {
                        stdin: stdin.as_mut(),
                        stdout: &mut captured,
                        stderr: &mut *err,
                    },
                    &mut self.env,
                );
                self.env.write_file(file, &captured, true);
                result
            }
        };

        let status = result.map_err(|e| EvalError::Runtime {
            command: name.to_string(),
            message: format!("{:#}", e),
        })?;
        self.env.last_status = status;
        Ok(status)
    }

    /// Expand a Word to a String, substituting parameters and command output.
    fn expand_word(&mut self, word: &Word, err: &mut dyn Write) -> Result<String, EvalError> {
        match word {
            Word::Literal(s) => Ok(s.clone()),
            Word::Compound(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        WordPart::Literal(text) => result.push_str(text),
                        // unset variables expand to nothing
                        WordPart::ParamSubst(name) => {
                            if let Some(value) = self.env.get_var(name) {
                                result.push_str(&value);
                            }
                        }
                        WordPart::CmdSubst(source) => {
                            result.push_str(&self.substitute_command(source, err)?);
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    /// Runs `$(...)` and returns its stdout without trailing newlines.
    fn substitute_command(
        &mut self,
        source: &str,
        err: &mut dyn Write,
    ) -> Result<String, EvalError> {
        let tokens = lexer::split_into_tokens(source)?;
        let ast = parser::construct_ast(tokens)?;

        // `exit` only leaves the substitution
        let outer_exit = self.env.exit_requested.take();
        let mut captured = Vec::new();
        let result = self.execute(&ast, &mut captured, err);
        self.env.exit_requested = outer_exit;
        result?;

        let text = String::from_utf8_lossy(&captured);
        Ok(text.trim_end_matches('\n').to_string())
    }
}

fn is_command_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
