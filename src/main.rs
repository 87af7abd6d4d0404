//! Sandbox shell showing off the command engine.
//!
//! Usage:
//!   shell_engine                    # Interactive REPL
//!   shell_engine -c "<line>"        # Execute one line and exit

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use shell_engine::parameter::Value;
use shell_engine::{
    Bracket, CliConfig, Command, Environment, Interpreter, LineOutcome, Outcome, ParsedParameter,
    StringsCompleter, TokenizerConfig,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, prelude::*};

#[derive(FromArgs)]
/// Interactive sandbox shell.
struct Args {
    /// keep the first registered command on name conflicts instead of failing
    #[argh(switch)]
    lenient: bool,

    /// disable colored output
    #[argh(switch)]
    no_color: bool,

    /// history file, defaults to .sandbox-history
    #[argh(option)]
    history: Option<PathBuf>,

    /// require (), {} and [] to be balanced before a line is accepted
    #[argh(switch)]
    brackets: bool,

    /// execute a single line and exit
    #[argh(option, short = 'c')]
    command: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run(argh::from_env()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let mut config = CliConfig::new("sandbox")
        .with_strict(!args.lenient)
        .with_color(!args.no_color);
    if let Some(history) = args.history {
        config = config.with_history_file(Some(history));
    }
    if args.brackets {
        config = config.with_tokenizer(TokenizerConfig::default().with_brackets(&[
            Bracket::Round,
            Bracket::Curly,
            Bracket::Square,
        ]));
    }

    let mut shell = Interpreter::builder(config)
        .commands(sandbox_commands()?)
        .build()
        .context("failed to set up the shell")?;

    let interrupter = shell.interrupter();
    ctrlc::set_handler(move || interrupter.interrupt())
        .context("failed to install the Ctrl-C handler")?;

    if let Some(line) = args.command {
        return Ok(match shell.execute_line(&line) {
            LineOutcome::Executed(Outcome::Completed) | LineOutcome::Empty => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        });
    }

    info!("starting interactive session");
    shell.repl()?;
    Ok(ExitCode::SUCCESS)
}

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
    tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
    exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.";

#[derive(Debug, Clone, Copy)]
enum Letter {
    A,
    B,
    C,
}

#[derive(Debug, thiserror::Error)]
#[error("expected one of A, B, C but got '{0}'")]
struct UnknownLetter(String);

impl FromStr for Letter {
    type Err = UnknownLetter;

    fn from_str(s: &str) -> Result<Self, UnknownLetter> {
        match s {
            "A" => Ok(Letter::A),
            "B" => Ok(Letter::B),
            "C" => Ok(Letter::C),
            other => Err(UnknownLetter(other.to_string())),
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn text(params: &[ParsedParameter], index: usize) -> String {
    params
        .get(index)
        .and_then(|p| p.value::<String>())
        .cloned()
        .unwrap_or_default()
}

fn say(env: &Environment, line: impl fmt::Display) -> Result<()> {
    writeln!(env.output(), "{line}")?;
    Ok(())
}

fn sandbox_commands() -> Result<Vec<Command>> {
    let commands = vec![
        Command::builder("noparam")
            .description("Takes nothing, prints its name.")
            .help(LOREM)
            .run(|env| say(env, "noparam"))
            .build()?,
        Command::builder("multi-name")
            .alias("multi-name1")
            .alias("multi-name2")
            .description("One command, three names.")
            .run(|env| say(env, "multiName"))
            .build()?,
        Command::builder("flushed")
            .description("Echo the rest of the line verbatim.")
            .parameter(|p| p.name("text").flush())
            .parameters_action(|_, params, env| {
                say(env, format!("flushed '{}'", text(params, 0)))
            })
            .build()?,
        Command::builder("add")
            .description("Add two integers.")
            .parameter(|p| p.name("a").parse_as::<i64>())
            .parameter(|p| p.name("b").parse_as::<i64>().default_value("0"))
            .parameters_action(|_, params, env| {
                let a = params[0].value::<i64>().copied().unwrap_or_default();
                let b = params[1].value::<i64>().copied().unwrap_or_default();
                say(env, a + b)
            })
            .build()?,
        Command::builder("test-boolean")
            .description("A boolean and an optional one.")
            .parameter(|p| {
                p.name("b")
                    .parse_as::<bool>()
                    .completer(StringsCompleter::new(["true", "false"]))
            })
            .parameter(|p| {
                p.name("maybe")
                    .parse_as::<bool>()
                    .completer(StringsCompleter::new(["true", "false"]))
                    .nullable()
            })
            .parameters_action(|_, params, env| {
                let b = params[0].value::<bool>().copied().unwrap_or_default();
                let maybe = match params[1].value::<bool>() {
                    Some(value) => value.to_string(),
                    None => "null".to_string(),
                };
                say(env, format!("testBoolean({b},{maybe})"))
            })
            .build()?,
        Command::builder("test-enum")
            .description("Pick a letter.")
            .parameter(|p| {
                p.name("letter")
                    .description("one of A, B or C")
                    .parse_as::<Letter>()
                    .completer(StringsCompleter::new(["A", "B", "C"]))
            })
            .parameters_action(|_, params, env| {
                let letter = params[0].value::<Letter>().context("letter is required")?;
                say(env, format!("testEnum({letter})"))
            })
            .build()?,
        Command::builder("sleep")
            .description("Wait, Ctrl-C stops early.")
            .parameter(|p| p.name("seconds").parse_as::<u64>().default_value("5"))
            .parameters_action(|_, params, env| {
                let seconds = params[0].value::<u64>().copied().unwrap_or(5);
                env.cancel().sleep(Duration::from_secs(seconds))?;
                say(env, format!("slept {seconds}s"))
            })
            .build()?,
        Command::builder("fail")
            .description("Always fails.")
            .run(|_| {
                std::fs::read_to_string("/nonexistent/sandbox.conf")
                    .context("could not load the sandbox configuration")?;
                Ok(())
            })
            .build()?,
        Command::builder("pair")
            .description("Custom parser reading two words at once.")
            .parameter(|p| {
                p.name("pair").parser(|_, line| {
                    let key = line.next_word().context("missing key")?;
                    let value = line.next_word().context("missing value")?;
                    Ok(Value::new(format!("{key}={value}")))
                })
            })
            .parameters_action(|_, params, env| say(env, text(params, 0)))
            .build()?,
        Command::builder("cliparams")
            .description("Parameters with completion.")
            .sub_command_with("completed-param", |b| {
                b.parameter(|p| {
                    p.name("theParameter")
                        .description("The parameter description")
                        .completer(StringsCompleter::new(["a", "B", "CdeF"]))
                })
                .parameters_action(|_, params, env| {
                    say(env, format!("completedParam({})", text(params, 0)))
                })
            })
            .sub_command_with("supplied-param", |b| {
                b.parameter(|p| p.completer(StringsCompleter::new(["a", "b", "c"])))
                    .parameter(|p| p.completer(StringsCompleter::new(["d", "e", "f"])))
                    .parameter(|p| p.completer(StringsCompleter::new(["a", "b", "c"])))
                    .parameters_action(|_, params, env| {
                        say(
                            env,
                            format!(
                                "suppliedParam({},{},{})",
                                text(params, 0),
                                text(params, 1),
                                text(params, 2)
                            ),
                        )
                    })
            })
            .build()?,
    ];
    Ok(commands)
}
