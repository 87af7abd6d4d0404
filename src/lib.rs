//! An embeddable engine for interactive, line-oriented command shells.
//!
//! Applications describe a tree of commands with [`Command::builder`]: each command has
//! names, positional parameters with their own parsers and completers, an action and
//! optionally nested sub-commands. The [`Interpreter`] registers those commands next to
//! the built-in `help` and `exit`, then reads lines, splits them into words with shell
//! style quoting and escaping, resolves the longest command path and runs the command on
//! a single background worker that can be interrupted.
//!
//! The same tokenizer drives tab completion and multi-line editing in the interactive
//! loop, where the command tree doubles as the completion tree.

pub mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod io_adapters;
pub mod parameter;
pub mod registry;
pub mod tokenizer;

pub use command::{Command, CommandBuilder};
pub use completion::{CompletionNode, StringsCompleter, WordCompleter};
pub use config::CliConfig;
pub use cursor::CommandLine;
pub use engine::{CancelToken, Interrupter, Outcome};
pub use env::Environment;
pub use error::{Interrupted, ParameterError, RegistryError, ShellError};
pub use io_adapters::Output;
pub use parameter::{ParsedParameter, Value};
pub use registry::Registry;
pub use tokenizer::{Bracket, Incomplete, TokenizerConfig};

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LineOutcome};
