use std::fmt;
use std::io::Write;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::warn;

use crate::completion::CompletionNode;
use crate::cursor::CommandLine;
use crate::env::Environment;
use crate::error::{ParameterError, RegistryError};
use crate::parameter::{ParameterBuilder, ParameterSpec, ParsedParameter};
use crate::registry::Registry;

/// Signature of a runnable command body.
///
/// The action receives the command it belongs to, the line cursor positioned after the
/// command path, and the execution environment.
pub type ActionFn =
    dyn Fn(&Command, &mut dyn CommandLine, &Environment) -> Result<()> + Send + Sync;

/// Builds the completion subtree below a command, given the root registry.
pub type CompleterFactory = Arc<dyn Fn(&Registry) -> Vec<CompletionNode> + Send + Sync>;

/// What happens when a command is invoked.
#[derive(Clone)]
pub enum CommandAction {
    /// Placeholder for groups without a body: prints `<line> is not implemented`.
    Unimplemented,
    Run(Arc<ActionFn>),
}

impl CommandAction {
    pub fn is_runnable(&self) -> bool {
        matches!(self, CommandAction::Run(_))
    }
}

impl fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandAction::Unimplemented => f.write_str("Unimplemented"),
            CommandAction::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// A named, possibly nested, command.
///
/// Commands are immutable once built, except for the registry merge which folds the
/// sub-commands of a duplicate into the surviving command and re-parents them.
#[derive(Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    help: String,
    parameters: Vec<ParameterSpec>,
    action: CommandAction,
    sub_commands: Registry,
    completer_factory: Option<CompleterFactory>,
    parent_path: Vec<String>,
    qualified_name: OnceLock<String>,
}

impl Command {
    /// Start building a command whose sub-commands reject conflicting registrations.
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name.into())
    }

    /// Primary name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All names, primary first.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn action(&self) -> &CommandAction {
        &self.action
    }

    pub fn sub_commands(&self) -> &Registry {
        &self.sub_commands
    }

    pub(crate) fn sub_commands_mut(&mut self) -> &mut Registry {
        &mut self.sub_commands
    }

    pub fn has_action(&self) -> bool {
        self.action.is_runnable()
    }

    /// Primary names from the root down to this command.
    pub fn path(&self) -> Vec<&str> {
        self.parent_path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
            .collect()
    }

    /// Primary names from the root joined with `.`, computed once.
    pub fn qualified_name(&self) -> &str {
        self.qualified_name.get_or_init(|| self.path().join("."))
    }

    /// Attach this command, and recursively its sub-commands, below `parent_path`.
    pub(crate) fn reparent(&mut self, parent_path: Vec<String>) {
        self.parent_path = parent_path;
        self.qualified_name = OnceLock::new();
        let own_path = self.path().into_iter().map(str::to_string).collect();
        self.sub_commands.set_owner(own_path);
    }

    /// Parse all declared parameters, in order, from the line.
    pub fn parse_parameters(
        &self,
        line: &mut dyn CommandLine,
    ) -> Result<Vec<ParsedParameter>, ParameterError> {
        self.parameters
            .iter()
            .map(|spec| {
                spec.parse(line).inspect_err(|err| {
                    warn!(command = %self.qualified_name(), parameter = %err.name, "{err}");
                })
            })
            .collect()
    }

    /// Run the action against the rest of the line.
    pub fn run(&self, line: &mut dyn CommandLine, env: &Environment) -> Result<()> {
        match &self.action {
            CommandAction::Unimplemented => {
                writeln!(env.output(), "{} is not implemented", line.raw_line())?;
                Ok(())
            }
            CommandAction::Run(action) => action(self, line, env),
        }
    }

    /// Completion node labelled with all names of this command.
    ///
    /// A completer factory, when set, supplies the children. Otherwise the parameter
    /// completers form a chain, followed by the nodes of the sub-commands.
    pub fn completion_node(&self, root: &Registry) -> CompletionNode {
        let children = match &self.completer_factory {
            Some(factory) => factory(root),
            None => {
                let mut children = Vec::new();
                if let Some(chain) = self.parameter_chain() {
                    children.push(chain);
                }
                children.extend(self.sub_commands.completion_nodes(root));
                children
            }
        };
        CompletionNode::names(self.aliases.iter().cloned()).with_children(children)
    }

    fn parameter_chain(&self) -> Option<CompletionNode> {
        self.parameters.iter().rev().fold(None, |next, spec| {
            let node = CompletionNode::completer(Arc::clone(spec.completer()));
            Some(match next {
                Some(next) => node.with_children(vec![next]),
                None => node,
            })
        })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.qualified_name())
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("action", &self.action)
            .field("sub_commands", &self.sub_commands)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name())
    }
}

/// Fluent builder for [`Command`].
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    description: String,
    help: String,
    parameters: Vec<ParameterSpec>,
    action: CommandAction,
    strict: bool,
    sub_commands: Vec<SubCommand>,
    completer_factory: Option<CompleterFactory>,
}

enum SubCommand {
    Built(Command),
    Inline(CommandBuilder),
}

impl CommandBuilder {
    fn new(name: String) -> Self {
        Self {
            aliases: vec![name.clone()],
            name,
            description: String::new(),
            help: String::new(),
            parameters: Vec::new(),
            action: CommandAction::Unimplemented,
            strict: true,
            sub_commands: Vec::new(),
            completer_factory: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Whether conflicting sub-command registrations fail the build. Defaults to `true`.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Declare the next positional parameter.
    pub fn parameter<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ParameterBuilder) -> ParameterBuilder,
    {
        let index = self.parameters.len();
        self.parameters.push(configure(ParameterBuilder::new(index)).build());
        self
    }

    /// Full-control action.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Command, &mut dyn CommandLine, &Environment) -> Result<()> + Send + Sync + 'static,
    {
        self.action = CommandAction::Run(Arc::new(action));
        self
    }

    /// Action that reads the rest of the line itself.
    pub fn line_action<F>(self, action: F) -> Self
    where
        F: Fn(&mut dyn CommandLine, &Environment) -> Result<()> + Send + Sync + 'static,
    {
        self.action(move |_, line, env| action(line, env))
    }

    /// Action that ignores the line.
    pub fn run<F>(self, action: F) -> Self
    where
        F: Fn(&Environment) -> Result<()> + Send + Sync + 'static,
    {
        self.action(move |_, _, env| action(env))
    }

    /// Action receiving the parsed parameters.
    ///
    /// When a parameter fails to parse, the failure is reported on the output with the
    /// parameter name and the action is not invoked.
    pub fn parameters_action<F>(self, action: F) -> Self
    where
        F: Fn(&Command, &[ParsedParameter], &Environment) -> Result<()> + Send + Sync + 'static,
    {
        self.action(move |command, line, env| match command.parse_parameters(line) {
            Ok(parameters) => action(command, &parameters, env),
            Err(err) => {
                let mut output = env.output();
                if output.color() {
                    writeln!(
                        output,
                        "Error parsing parameter {}: {:#}",
                        err.name.bold(),
                        err.source
                    )?;
                } else {
                    writeln!(output, "{err}")?;
                }
                Ok(())
            }
        })
    }

    /// Replace the completion subtree below this command.
    pub fn completer_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Registry) -> Vec<CompletionNode> + Send + Sync + 'static,
    {
        self.completer_factory = Some(Arc::new(factory));
        self
    }

    /// Add an already built sub-command.
    pub fn sub_command(mut self, command: Command) -> Self {
        self.sub_commands.push(SubCommand::Built(command));
        self
    }

    /// Declare a sub-command inline. It inherits this builder's strictness.
    pub fn sub_command_with<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(CommandBuilder) -> CommandBuilder,
    {
        let builder = configure(CommandBuilder::new(name.into()).strict(self.strict));
        self.sub_commands.push(SubCommand::Inline(builder));
        self
    }

    /// Assemble the command, merging sub-commands in declaration order.
    pub fn build(self) -> Result<Command, RegistryError> {
        let mut sub_commands = Registry::new(self.strict);
        sub_commands.set_owner(vec![self.name.clone()]);
        for sub in self.sub_commands {
            let command = match sub {
                SubCommand::Built(command) => command,
                SubCommand::Inline(builder) => builder.build()?,
            };
            sub_commands.merge(command)?;
        }
        Ok(Command {
            name: self.name,
            aliases: self.aliases,
            description: self.description,
            help: self.help,
            parameters: self.parameters,
            action: self.action,
            sub_commands,
            completer_factory: self.completer_factory,
            parent_path: Vec::new(),
            qualified_name: OnceLock::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ParsedCommandLine;
    use crate::io_adapters::Output;
    use crate::tokenizer::Tokenizer;

    fn env() -> (Environment, crate::io_adapters::MemHandle) {
        let (output, handle) = Output::memory();
        (Environment::new(output, Arc::new(Registry::new(true))), handle)
    }

    fn line(text: &str, consumed: usize) -> ParsedCommandLine {
        let mut line =
            ParsedCommandLine::new(Tokenizer::default().tokenize_accepted(text).unwrap());
        for _ in 0..consumed {
            line.next_word();
        }
        line
    }

    #[test]
    fn test_aliases_start_with_primary_name() {
        let command = Command::builder("list")
            .alias("ls")
            .alias("list")
            .alias("l")
            .build()
            .unwrap();
        assert_eq!(command.aliases(), ["list", "ls", "l"]);
        assert_eq!(command.name(), "list");
        assert!(!command.has_action());
    }

    #[test]
    fn test_qualified_name_follows_nesting() {
        let command = Command::builder("a")
            .sub_command_with("b", |b| b.sub_command_with("c", |c| c.run(|_| Ok(()))))
            .build()
            .unwrap();
        let b = command.sub_commands().get("b").unwrap();
        let c = b.sub_commands().get("c").unwrap();
        assert_eq!(command.qualified_name(), "a");
        assert_eq!(b.qualified_name(), "a.b");
        assert_eq!(c.qualified_name(), "a.b.c");
        assert_eq!(c.path(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unimplemented_action_reports_line() {
        let (env, handle) = env();
        let command = Command::builder("todo").build().unwrap();
        command.run(&mut line("todo later", 1), &env).unwrap();
        assert_eq!(handle.contents(), "todo later is not implemented\n");
    }

    #[test]
    fn test_parameters_action_receives_values() {
        let (env, handle) = env();
        let command = Command::builder("add")
            .parameter(|p| p.name("a").parse_as::<i32>())
            .parameter(|p| p.name("b").parse_as::<i32>())
            .parameters_action(|_, params, env| {
                let a = params[0].value::<i32>().copied().unwrap_or_default();
                let b = params[1].value::<i32>().copied().unwrap_or_default();
                writeln!(env.output(), "{}", a + b)?;
                Ok(())
            })
            .build()
            .unwrap();
        command.run(&mut line("add 2 40", 1), &env).unwrap();
        assert_eq!(handle.contents(), "42\n");
    }

    #[test]
    fn test_parameter_failure_skips_action() {
        let (env, handle) = env();
        let command = Command::builder("add")
            .parameter(|p| p.name("a").parse_as::<i32>())
            .parameters_action(|_, _, env| {
                writeln!(env.output(), "ran")?;
                Ok(())
            })
            .build()
            .unwrap();
        command.run(&mut line("add x", 1), &env).unwrap();
        let out = handle.contents();
        assert!(out.starts_with("Error parsing parameter a: invalid value 'x'"), "{out}");
        assert!(!out.contains("ran"));
    }

    #[test]
    fn test_strict_builder_rejects_duplicate_sub_commands() {
        let result = Command::builder("g")
            .sub_command_with("x", |b| b.run(|_| Ok(())))
            .sub_command_with("x", |b| b.run(|_| Ok(())))
            .build();
        assert!(matches!(result, Err(RegistryError::Conflict { .. })));

        let lenient = Command::builder("g")
            .strict(false)
            .sub_command_with("x", |b| b.run(|_| Ok(())))
            .sub_command_with("x", |b| b.run(|_| Ok(())))
            .build()
            .unwrap();
        assert_eq!(lenient.sub_commands().len(), 1);
    }
}
