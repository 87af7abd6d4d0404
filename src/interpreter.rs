use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Editor, Helper};
use tracing::{debug, error, info, warn};

use crate::builtin::builtins;
use crate::command::Command;
use crate::completion::CompletionTree;
use crate::config::CliConfig;
use crate::cursor::{CommandLine, ParsedCommandLine};
use crate::engine::{Executor, Interrupter, Outcome};
use crate::env::Environment;
use crate::error::{RegistryError, ShellError};
use crate::io_adapters::Output;
use crate::registry::Registry;
use crate::tokenizer::{Incomplete, Mode, TokenizedLine, Tokenizer};

/// What became of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Nothing but whitespace.
    Empty,
    /// The first word names no command; `Unknown command` was printed.
    Unknown,
    /// The line could not be tokenized; `Syntax error: ..` was printed.
    SyntaxError(Incomplete),
    /// A command ran on the executor.
    Executed(Outcome),
}

/// Collects commands and settings for an [`Interpreter`].
pub struct InterpreterBuilder {
    config: CliConfig,
    commands: Vec<Command>,
    output: Option<Output>,
}

impl InterpreterBuilder {
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Where commands write; standard output when unset.
    pub fn output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Register the application commands, then the built-ins, and start the executor.
    pub fn build(self) -> Result<Interpreter, ShellError> {
        let mut registry = Registry::new(self.config.strict);
        for command in self.commands {
            registry.merge(command)?;
        }
        for command in builtins(self.config.help_width)? {
            registry.merge(command)?;
        }

        let output = self.output.unwrap_or_else(Output::stdout);
        let color = self.config.color && output.color();
        let completion = Arc::new(CompletionTree::build(&registry));
        info!(name = %self.config.name, commands = registry.len(), "interpreter ready");
        Ok(Interpreter {
            tokenizer: Tokenizer::new(self.config.tokenizer.clone()),
            config: self.config,
            registry: Arc::new(registry),
            completion,
            executor: Executor::new()?,
            output: output.with_color(color),
            exit_requested: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Line-oriented command interpreter.
///
/// The interpreter owns the command registry, the completion tree derived from it and
/// the executor that runs commands one at a time. Lines come either from the interactive
/// loop ([`Interpreter::repl`]) or directly from [`Interpreter::execute_line`].
///
/// Example
/// ```
/// use std::io::Write;
/// use shell_engine::{CliConfig, Command, Interpreter, Output};
///
/// let (output, captured) = Output::memory();
/// let shell = Interpreter::builder(CliConfig::new("demo"))
///     .output(output)
///     .command(
///         Command::builder("hello")
///             .run(|env| {
///                 writeln!(env.output(), "hi")?;
///                 Ok(())
///             })
///             .build()?,
///     )
///     .build()?;
/// shell.execute_line("hello");
/// assert_eq!(captured.contents(), "hi\n");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Interpreter {
    config: CliConfig,
    tokenizer: Tokenizer,
    registry: Arc<Registry>,
    completion: Arc<CompletionTree>,
    executor: Executor,
    output: Output,
    exit_requested: Arc<AtomicBool>,
}

impl Interpreter {
    pub fn builder(config: CliConfig) -> InterpreterBuilder {
        InterpreterBuilder {
            config,
            commands: Vec::new(),
            output: None,
        }
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn completion_tree(&self) -> &CompletionTree {
        &self.completion
    }

    /// Handle that interrupts the running command, e.g. from a Ctrl-C handler.
    pub fn interrupter(&self) -> Interrupter {
        self.executor.interrupter()
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }

    /// Register one more command and rebuild the completion tree.
    pub fn register(&mut self, command: Command) -> Result<(), RegistryError> {
        Arc::make_mut(&mut self.registry).merge(command)?;
        self.completion = Arc::new(CompletionTree::build(&self.registry));
        Ok(())
    }

    /// Tokenize and run one accepted line, waiting for the command to finish.
    pub fn execute_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            return LineOutcome::Empty;
        }
        match self.tokenizer.tokenize_accepted(line) {
            Ok(tokenized) => self.run_line(tokenized),
            Err(incomplete) => {
                debug!(line, "rejected line: {incomplete}");
                self.print(format_args!("Syntax error: {incomplete}"));
                LineOutcome::SyntaxError(incomplete)
            }
        }
    }

    /// Resolve and run an already tokenized line.
    pub fn run_line(&self, line: TokenizedLine) -> LineOutcome {
        let mut cursor = ParsedCommandLine::new(line);
        if !cursor.has_next() {
            return LineOutcome::Empty;
        }
        let Some(command) = self.registry.resolve(&mut cursor) else {
            debug!(line = %cursor, "unknown command");
            self.print(format_args!("Unknown command"));
            return LineOutcome::Unknown;
        };
        debug!(command = %command.qualified_name(), "resolved command");

        let env = Environment::new(self.output.clone(), Arc::clone(&self.registry))
            .with_exit_flag(Arc::clone(&self.exit_requested));
        match self.executor.submit(command, cursor, env) {
            Ok(completion) => LineOutcome::Executed(completion.wait()),
            Err(err) => {
                error!("{err}");
                LineOutcome::Executed(Outcome::Skipped)
            }
        }
    }

    /// Read, execute and repeat until a command requests exit or input ends.
    ///
    /// Ctrl-C while editing drops the current line. History is loaded from and saved to
    /// the configured file; failing to do so is logged and otherwise ignored.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut editor: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(ShellHelper {
            tokenizer: self.tokenizer.clone(),
            completion: Arc::clone(&self.completion),
        }));
        if let Some(path) = &self.config.history_file {
            if let Err(err) = editor.load_history(path) {
                debug!(path = %path.display(), "no history loaded: {err}");
            }
        }

        let prompt = self.config.prompt();
        while !self.exit_requested() {
            match editor.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(err) = editor.add_history_entry(line.as_str()) {
                            warn!("failed to record history entry: {err}");
                        }
                    }
                    self.execute_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(path) = &self.config.history_file {
            if let Err(err) = editor.save_history(path) {
                warn!(path = %path.display(), "failed to save history: {err}");
            }
        }
        Ok(())
    }

    fn print(&self, message: std::fmt::Arguments<'_>) {
        let mut output = self.output.clone();
        let result = if output.color() {
            writeln!(output, "{}", message.to_string().red())
        } else {
            writeln!(output, "{message}")
        };
        if let Err(err) = result {
            error!("failed to write to output: {err}");
        }
    }
}

/// rustyline glue: completion and multi-line validation.
struct ShellHelper {
    tokenizer: Tokenizer,
    completion: Arc<CompletionTree>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Ok(tokenized) = self.tokenizer.tokenize(line, pos, Mode::Complete) else {
            return Ok((pos, Vec::new()));
        };
        let Some(completions) = self.completion.complete(&tokenized) else {
            return Ok((pos, Vec::new()));
        };
        let pairs = completions
            .candidates
            .into_iter()
            .map(|candidate| Pair {
                replacement: tokenized.escape(&candidate, true),
                display: candidate,
            })
            .collect();
        Ok((completions.start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        match self.tokenizer.tokenize(input, input.len(), Mode::Validate) {
            Ok(_) => Ok(ValidationResult::Valid(None)),
            Err(_) => Ok(ValidationResult::Incomplete),
        }
    }
}

impl Helper for ShellHelper {}
