//! Name to command mapping, one per nesting level.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::command::Command;
use crate::completion::CompletionNode;
use crate::cursor::CommandLine;
use crate::error::RegistryError;

/// Commands of one level, keyed by every alias.
///
/// Registering a name that is already taken merges the newcomer into the existing
/// command: its sub-commands are moved below the existing command. When both commands
/// carry a runnable action, a strict registry fails while a lenient one keeps the
/// command registered first.
#[derive(Clone, Default)]
pub struct Registry {
    strict: bool,
    owner: Vec<String>,
    commands: Vec<Arc<Command>>,
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl Registry {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Number of distinct commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// Distinct commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    /// Every registered name with its command, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Arc<Command>)> {
        self.names
            .iter()
            .map(|name| (name.as_str(), &self.commands[self.index[name]]))
    }

    /// Register `command` under each of its aliases.
    pub fn merge(&mut self, mut command: Command) -> Result<(), RegistryError> {
        command.reparent(self.owner.clone());
        let incoming = Arc::new(command);
        let mut slot = None;
        let mut collisions = Vec::new();
        for alias in incoming.aliases() {
            match self.index.get(alias).copied() {
                None => {
                    let i = *slot.get_or_insert_with(|| {
                        self.commands.push(Arc::clone(&incoming));
                        self.commands.len() - 1
                    });
                    self.index.insert(alias.clone(), i);
                    self.names.push(alias.clone());
                }
                Some(existing) if !collisions.contains(&existing) => collisions.push(existing),
                Some(_) => {}
            }
        }
        // one merge per existing command, however many aliases hit it
        for existing in collisions {
            self.merge_into(existing, &incoming)?;
        }
        debug!(command = %incoming.qualified_name(), "registered command");
        Ok(())
    }

    /// Register every command of `other`, in order.
    pub fn merge_all(&mut self, other: &Registry) -> Result<(), RegistryError> {
        for command in other.commands() {
            self.merge(Command::clone(command))?;
        }
        Ok(())
    }

    fn merge_into(&mut self, existing: usize, incoming: &Command) -> Result<(), RegistryError> {
        let previous = &mut self.commands[existing];
        if previous.has_action() && incoming.has_action() {
            if self.strict {
                return Err(RegistryError::Conflict {
                    command: incoming.qualified_name().to_string(),
                    existing: previous.qualified_name().to_string(),
                });
            }
            info!(
                command = %incoming.qualified_name(),
                existing = %previous.qualified_name(),
                "command conflict, keeping the first registration"
            );
        }
        let target = Arc::make_mut(previous).sub_commands_mut();
        for sub in incoming.sub_commands().commands() {
            target.merge(Command::clone(sub))?;
        }
        Ok(())
    }

    /// Re-attach every command below `owner`.
    pub(crate) fn set_owner(&mut self, owner: Vec<String>) {
        for command in &mut self.commands {
            Arc::make_mut(command).reparent(owner.clone());
        }
        self.owner = owner;
    }

    /// Consume command names from the front of `line` for as long as they resolve,
    /// descending into sub-commands, and return the deepest command found.
    pub fn resolve(&self, line: &mut dyn CommandLine) -> Option<Arc<Command>> {
        let mut registry = self;
        let mut resolved: Option<&Arc<Command>> = None;
        while let Some(name) = line.peek() {
            let Some(command) = registry.get(name) else {
                break;
            };
            line.next_word();
            registry = command.sub_commands();
            resolved = Some(command);
        }
        resolved.cloned()
    }

    /// Completion nodes for the commands of this level.
    pub fn completion_nodes(&self, root: &Registry) -> Vec<CompletionNode> {
        self.commands
            .iter()
            .map(|command| command.completion_node(root))
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("strict", &self.strict)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
