use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::cursor::CommandLine;
use crate::env::Environment;
use crate::error::RegistryError;
use crate::registry::Registry;

/// Name of the built-in help command.
pub const HELP: &str = "help";

/// Built-in commands, merged after the application's own commands.
pub fn builtins(help_width: usize) -> Result<Vec<Command>, RegistryError> {
    Ok(vec![exit_command()?, help_command(help_width)?])
}

/// `exit` / `quit`: stop the input loop once the command returns.
pub fn exit_command() -> Result<Command, RegistryError> {
    Command::builder("exit")
        .alias("quit")
        .description("Exit the shell.")
        .run(|env| {
            env.request_exit();
            Ok(())
        })
        .build()
}

/// `help [command path]`: describe a command, or list the root commands.
pub fn help_command(width: usize) -> Result<Command, RegistryError> {
    Command::builder(HELP)
        .description("Print some help.")
        .help("Print some help for a given a command or list the available commands")
        .completer_factory(|root| {
            root.commands()
                .filter(|command| command.qualified_name() != HELP)
                .map(|command| command.completion_node(root))
                .collect()
        })
        .line_action(move |line, env| print_help(line, env, width))
        .build()
}

fn print_help(line: &mut dyn CommandLine, env: &Environment, width: usize) -> Result<()> {
    let color = env.output().color();
    let root = env.registry();
    let command = root.resolve(line);
    let mut text = String::new();

    let registry: &Registry = match &command {
        Some(command) => {
            describe(&mut text, command, width, color)?;
            command.sub_commands()
        }
        None => root,
    };
    if !registry.is_empty() {
        list_commands(&mut text, registry, color)?;
    }

    env.output().write_all(text.as_bytes())?;
    Ok(())
}

fn describe(text: &mut String, command: &Command, width: usize, color: bool) -> std::fmt::Result {
    let path = command.path();
    for parent in &path[..path.len() - 1] {
        write!(text, "{parent} > ")?;
    }
    writeln!(text, "{}\n", emphasize(&command.aliases().join(", "), color))?;

    let description = command.description().trim();
    if !description.is_empty() {
        writeln!(text, "  {description}\n")?;
    }
    let help = command.help().replace('\n', "");
    let help = help.trim();
    if !help.is_empty() {
        writeln!(text, "  {}\n", wrap(help, width.saturating_sub(2)))?;
    }

    let parameters = command.parameters();
    if !parameters.is_empty() {
        let max = parameters.iter().map(|p| p.name().len()).max().unwrap_or(0);
        writeln!(text, "Parameters:")?;
        for parameter in parameters {
            let name = format!("  {:<w$}", parameter.name(), w = max + 1);
            let description = parameter.description().unwrap_or("No description");
            writeln!(text, "    {}: {description}", emphasize(&name, color))?;
        }
    }
    Ok(())
}

fn list_commands(text: &mut String, registry: &Registry, color: bool) -> std::fmt::Result {
    writeln!(text, "Commands:")?;
    let max = registry.entries().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, command) in registry.entries() {
        let label = format!("  {name:<w$}", w = max + 1);
        let description = match command.description().trim() {
            "" => "No description.",
            description => description,
        };
        writeln!(text, "{}: {description}", emphasize(&label, color))?;
    }
    Ok(())
}

fn emphasize(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Greedy word wrap; continuation lines are indented by two spaces. Words longer than
/// `width` are kept whole.
fn wrap(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_len = 0;
    for word in text.split_whitespace() {
        let len = word.chars().count();
        if line_len > 0 && line_len + 1 + len > width {
            out.push_str("\n  ");
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += len;
    }
    out
}
