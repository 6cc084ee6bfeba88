use crate::capability::CapabilitySet;
use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
use crate::env::Environment;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::io::{Read, Write};
use std::marker::PhantomData;

/// Built-in commands known to the interpreter at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process. They only ever see the streams and environment handed to them.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "grep".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, mut io: Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, &mut io, env)
    }
}

/// Result of `--help` or of arguments argh rejected.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: Streams<'_>, _env: &mut Environment) -> Result<ExitCode> {
        if self.is_error {
            writeln!(io.stderr, "{}", self.output.trim_end())?;
            Ok(2)
        } else {
            writeln!(io.stdout, "{}", self.output.trim_end())?;
            Ok(0)
        }
    }
}

/// Factory creating instances of one builtin.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &str {
        T::name()
    }

    fn create(&self, _env: &Environment, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match T::from_args(&[T::name()], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }
}

fn factory<T: BuiltinCommand + 'static>() -> Box<dyn CommandFactory> {
    Box::new(Factory::<T>::default())
}

/// The standard capability set.
pub(crate) fn standard() -> CapabilitySet {
    CapabilitySet::new()
        .with(factory::<Echo>)
        .with(factory::<Cat>)
        .with(factory::<WC>)
        .with(factory::<Grep>)
        .with(factory::<Head>)
        .with(factory::<Tail>)
        .with(factory::<True>)
        .with(factory::<False>)
        .with(factory::<Exit>)
        .with(factory::<Env>)
}

/// Feeds `f` the contents of every operand.
///
/// Operands name in-memory files; `-` or no operands at all mean stdin. Missing
/// files are reported on stderr and make the returned status 1, the remaining
/// operands are still processed.
fn each_input(
    cmd: &str,
    files: &[String],
    io: &mut Streams<'_>,
    env: &Environment,
    mut f: impl FnMut(Option<&str>, &[u8], &mut dyn Write) -> Result<()>,
) -> Result<ExitCode> {
    if files.is_empty() {
        let mut buf = Vec::new();
        io.stdin.read_to_end(&mut buf)?;
        f(None, &buf, &mut *io.stdout)?;
        return Ok(0);
    }

    let mut status = 0;
    for file in files {
        if file == "-" {
            let mut buf = Vec::new();
            io.stdin.read_to_end(&mut buf)?;
            f(Some(file), &buf, &mut *io.stdout)?;
            continue;
        }
        match env.read_file(file) {
            Some(data) => f(Some(file), data, &mut *io.stdout)?,
            None => {
                writeln!(io.stderr, "{}: {}: No such file", cmd, file)?;
                status = 1;
            }
        }
    }
    Ok(status)
}

fn lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|b| *b == b'\n').collect()
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, io: &mut Streams<'_>, _env: &mut Environment) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(io.stdout, "{}", s)?;
        } else {
            writeln!(io.stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// concatenate files to standard output
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print; stdin when none are given
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        each_input("cat", &self.files, io, env, |_, data, out| {
            out.write_all(data)?;
            Ok(())
        })
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct WC {
    #[argh(positional, greedy)]
    /// files to count; stdin when none are given
    pub files: Vec<String>,
}

impl BuiltinCommand for WC {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        each_input("wc", &self.files, io, env, |name, data, out| {
            let text = String::from_utf8_lossy(data);
            let lines = text.lines().count();
            let words = text.split_whitespace().count();
            let bytes = data.len();
            match name {
                Some(name) => writeln!(out, "{} {} {} {}", lines, words, bytes, name)?,
                None => writeln!(out, "{} {} {}", lines, words, bytes)?,
            }
            Ok(())
        })
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(switch, short = 'v')]
    /// select non-matching lines
    pub invert_match: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    /// Prints the selected lines of one input. Returns whether anything was selected.
    fn process_source(
        &self,
        data: &[u8],
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &regex::Regex,
    ) -> Result<bool> {
        let text = String::from_utf8_lossy(data);
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        if lines.is_empty() {
            return Ok(false);
        }

        let total_lines = lines.len();
        let mut to_print = vec![false; total_lines];
        let mut selected = false;

        for (i, line) in lines.iter().enumerate() {
            if re.is_match(line.trim_end_matches('\n')) != self.invert_match {
                selected = true;
                let end_print = i
                    .saturating_add(self.after_context)
                    .saturating_add(1)
                    .min(total_lines);
                to_print[i..end_print].fill(true);
            }
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();
        let mut last_printed_index: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed_index.is_some_and(|last| i > last + 1) {
                stdout.write_all(b"--\n")?;
            }
            write!(stdout, "{}{}", prefix, line)?;
            if !line.ends_with('\n') {
                writeln!(stdout)?;
            }
            last_printed_index = Some(i);
        }

        Ok(selected)
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("invalid regex pattern: {}", pattern))?;

        let show_names = self.files.len() > 1;
        let mut selected = false;
        let status = each_input("grep", &self.files, io, env, |name, data, out| {
            let name = if show_names { name } else { None };
            if self.process_source(data, out, name, &re)? {
                selected = true;
            }
            Ok(())
        })?;

        Ok(match (status, selected) {
            (0, true) => 0,
            (0, false) => 1,
            _ => 2,
        })
    }
}

#[derive(FromArgs)]
/// print the first lines of each input
pub struct Head {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print
    pub lines: usize,

    #[argh(positional, greedy)]
    /// files to read; stdin when none are given
    pub files: Vec<String>,
}

impl BuiltinCommand for Head {
    fn name() -> &'static str {
        "head"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let show_headers = self.files.len() > 1;
        let mut first = true;
        each_input("head", &self.files, io, env, |name, data, out| {
            write_header(out, name.filter(|_| show_headers), &mut first)?;
            for line in lines(data).into_iter().take(self.lines) {
                out.write_all(line)?;
            }
            Ok(())
        })
    }
}

#[derive(FromArgs)]
/// print the last lines of each input
pub struct Tail {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print
    pub lines: usize,

    #[argh(positional, greedy)]
    /// files to read; stdin when none are given
    pub files: Vec<String>,
}

impl BuiltinCommand for Tail {
    fn name() -> &'static str {
        "tail"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let show_headers = self.files.len() > 1;
        let mut first = true;
        each_input("tail", &self.files, io, env, |name, data, out| {
            write_header(out, name.filter(|_| show_headers), &mut first)?;
            let all = lines(data);
            let skip = all.len().saturating_sub(self.lines);
            for line in &all[skip..] {
                out.write_all(line)?;
            }
            Ok(())
        })
    }
}

/// `==> name <==` separators used by head and tail for multiple inputs.
fn write_header(out: &mut dyn Write, name: Option<&str>, first: &mut bool) -> Result<()> {
    if let Some(name) = name {
        if !*first {
            writeln!(out)?;
        }
        writeln!(out, "==> {} <==", name)?;
    }
    *first = false;
    Ok(())
}

#[derive(FromArgs)]
/// do nothing, successfully
pub struct True {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for True {
    fn name() -> &'static str {
        "true"
    }

    fn execute(self, _io: &mut Streams<'_>, _env: &mut Environment) -> Result<ExitCode> {
        Ok(0)
    }
}

#[derive(FromArgs)]
/// do nothing, unsuccessfully
pub struct False {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for False {
    fn name() -> &'static str {
        "false"
    }

    fn execute(self, _io: &mut Streams<'_>, _env: &mut Environment) -> Result<ExitCode> {
        Ok(1)
    }
}

#[derive(FromArgs)]
/// stop evaluation
pub struct Exit {
    #[argh(positional)]
    /// exit status; defaults to the status of the last command
    pub status: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let code = match &self.status {
            Some(s) => s
                .parse::<ExitCode>()
                .map_err(|_| anyhow!("{}: numeric argument required", s))?,
            None => env.last_status,
        };
        env.exit_requested = Some(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// print all shell variables as NAME=value, sorted by name
pub struct Env {}

impl BuiltinCommand for Env {
    fn name() -> &'static str {
        "env"
    }

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        let mut vars: Vec<(&String, &String)> = env.vars.iter().collect();
        vars.sort();
        for (k, v) in vars {
            writeln!(io.stdout, "{}={}", k, v)?;
        }
        Ok(0)
    }
}
