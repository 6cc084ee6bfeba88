//! Command line host for the shell bridge.
//!
//! `run` evaluates one snippet, `repl` evaluates lines interactively and
//! `serve` answers JSON requests on stdio before parking forever.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::Context;
    use argh::FromArgs;
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;
    use shell_bridge::{host, run_code};
    use std::io::{self, Read, Write};
    use std::path::PathBuf;
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    #[derive(FromArgs)]
    /// Evaluate shell snippets in a fresh sandboxed interpreter.
    struct Cli {
        #[argh(switch, short = 'v')]
        /// log evaluation details to stderr
        verbose: bool,

        #[argh(subcommand)]
        command: Command,
    }

    #[derive(FromArgs)]
    #[argh(subcommand)]
    enum Command {
        Run(RunArgs),
        Repl(ReplArgs),
        Serve(ServeArgs),
    }

    #[derive(FromArgs)]
    #[argh(subcommand, name = "run")]
    /// evaluate code once and print the combined result
    struct RunArgs {
        #[argh(option, short = 'f')]
        /// read the code from this file
        file: Option<PathBuf>,

        #[argh(positional)]
        /// code to evaluate; stdin is read when neither this nor --file is given
        code: Option<String>,
    }

    #[derive(FromArgs)]
    #[argh(subcommand, name = "repl")]
    /// evaluate lines interactively, each in a fresh interpreter
    struct ReplArgs {}

    #[derive(FromArgs)]
    #[argh(subcommand, name = "serve")]
    /// answer one JSON string per stdin line, then keep the process alive
    struct ServeArgs {}

    fn init_logging(verbose: bool) {
        // stderr only, stdout carries results
        let filter = if verbose {
            EnvFilter::new("shell_bridge=debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
    }

    pub fn main() -> anyhow::Result<()> {
        let cli: Cli = argh::from_env();
        init_logging(cli.verbose);

        match cli.command {
            Command::Run(args) => run(args),
            Command::Repl(_) => repl(),
            Command::Serve(_) => {
                let never = host::serve_stdio_forever().context("failed to start stdio host")?;
                match never {}
            }
        }
    }

    fn run(args: RunArgs) -> anyhow::Result<()> {
        let code = match (args.file, args.code) {
            (Some(_), Some(_)) => anyhow::bail!("pass either --file or code, not both"),
            (Some(path), None) => std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, Some(code)) => code,
            (None, None) => {
                let mut code = String::new();
                io::stdin()
                    .read_to_string(&mut code)
                    .context("failed to read code from stdin")?;
                code
            }
        };

        print_result(&run_code(&code))
    }

    fn repl() -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline("$ ") {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    print_result(&run_code(&line))?;
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    fn print_result(result: &str) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(result.as_bytes())?;
        if !result.is_empty() && !result.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    cli::main()
}

// The browser host is registered by the library's start function.
#[cfg(target_arch = "wasm32")]
fn main() {}
