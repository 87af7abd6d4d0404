//! Completion tree derived from the command registry.
//!
//! Every command contributes a node labelled with its names. Below it hangs either a
//! custom subtree produced by the command's completer factory, or the chain of its
//! parameter completers followed by the nodes of its sub-commands. The tree is rebuilt
//! from scratch whenever the registry changes.

use std::fmt;
use std::sync::Arc;

use crate::registry::Registry;
use crate::tokenizer::TokenizedLine;

/// Produces completion candidates for a partially typed word.
pub trait WordCompleter: Send + Sync {
    fn complete(&self, word: &str) -> Vec<String>;
}

impl<F> WordCompleter for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn complete(&self, word: &str) -> Vec<String> {
        self(word)
    }
}

/// Accepts any text: the only candidate is the word itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompleter;

impl WordCompleter for PassthroughCompleter {
    fn complete(&self, word: &str) -> Vec<String> {
        vec![word.to_string()]
    }
}

/// A fixed set of candidates.
#[derive(Debug, Clone, Default)]
pub struct StringsCompleter {
    values: Vec<String>,
}

impl StringsCompleter {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl WordCompleter for StringsCompleter {
    fn complete(&self, _word: &str) -> Vec<String> {
        self.values.clone()
    }
}

/// Adds the literal `null` to the candidates of another completer.
pub struct NullableCompleter {
    inner: Arc<dyn WordCompleter>,
}

impl NullableCompleter {
    pub fn new(inner: Arc<dyn WordCompleter>) -> Self {
        Self { inner }
    }
}

impl WordCompleter for NullableCompleter {
    fn complete(&self, word: &str) -> Vec<String> {
        let mut candidates = self.inner.complete(word);
        candidates.push("null".to_string());
        candidates
    }
}

enum Matcher {
    Names(Vec<String>),
    Completer(Arc<dyn WordCompleter>),
}

/// One level of the completion tree.
pub struct CompletionNode {
    matcher: Matcher,
    children: Vec<CompletionNode>,
}

impl CompletionNode {
    /// A node completing one of `names`.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: Matcher::Names(names.into_iter().map(Into::into).collect()),
            children: Vec::new(),
        }
    }

    /// A node delegating to a word completer.
    pub fn completer(completer: Arc<dyn WordCompleter>) -> Self {
        Self {
            matcher: Matcher::Completer(completer),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<CompletionNode>) -> Self {
        self.children = children;
        self
    }

    pub fn children(&self) -> &[CompletionNode] {
        &self.children
    }

    fn candidates(&self, word: &str) -> Vec<String> {
        match &self.matcher {
            Matcher::Names(names) => names.clone(),
            Matcher::Completer(completer) => completer.complete(word),
        }
    }

    /// Whether a fully typed word walks through this node.
    fn accepts(&self, word: &str) -> bool {
        match &self.matcher {
            Matcher::Names(names) => names.iter().any(|n| n == word),
            Matcher::Completer(completer) => completer.complete(word).iter().any(|c| c == word),
        }
    }
}

impl fmt::Debug for CompletionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CompletionNode");
        match &self.matcher {
            Matcher::Names(names) => s.field("names", names),
            Matcher::Completer(_) => s.field("completer", &".."),
        };
        s.field("children", &self.children).finish()
    }
}

/// Completion candidates for one word of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completions {
    /// Byte offset where the replacement starts: the raw start of the current word.
    pub start: usize,
    /// Logical candidates, in tree order, without duplicates.
    pub candidates: Vec<String>,
}

/// Completion tree for a whole registry.
#[derive(Debug, Default)]
pub struct CompletionTree {
    roots: Vec<CompletionNode>,
}

impl CompletionTree {
    pub fn build(registry: &Registry) -> Self {
        Self {
            roots: registry.completion_nodes(registry),
        }
    }

    pub fn roots(&self) -> &[CompletionNode] {
        &self.roots
    }

    /// Candidates for `partial`, given the words typed before it.
    pub fn candidates(&self, preceding: &[&str], partial: &str) -> Vec<String> {
        let mut frontier: Vec<&CompletionNode> = self.roots.iter().collect();
        for word in preceding {
            frontier = frontier
                .into_iter()
                .filter(|node| node.accepts(word))
                .flat_map(|node| node.children.iter())
                .collect();
            if frontier.is_empty() {
                return Vec::new();
            }
        }

        let mut candidates: Vec<String> = Vec::new();
        for node in frontier {
            for candidate in node.candidates(partial) {
                if !candidate.is_empty()
                    && candidate.starts_with(partial)
                    && !candidates.contains(&candidate)
                {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Candidates for the word under the cursor of a line tokenized for completion.
    pub fn complete(&self, line: &TokenizedLine) -> Option<Completions> {
        let index = line.cursor_word_index()?;
        let words = line.words();
        let current = words.get(index)?;
        let partial: String = current.text().chars().take(line.cursor_word_offset()).collect();
        let preceding: Vec<&str> = words[..index].iter().map(|w| w.text()).collect();
        Some(Completions {
            start: current.raw_offset(),
            candidates: self.candidates(&preceding, &partial),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::tokenizer::{Mode, Tokenizer};

    fn registry() -> Registry {
        let mut registry = Registry::new(true);
        registry
            .merge(
                Command::builder("color")
                    .alias("colour")
                    .parameter(|p| {
                        p.name("name")
                            .completer(StringsCompleter::new(["red", "green", "blue"]))
                    })
                    .parameter(|p| p.name("shade").nullable())
                    .run(|_| Ok(()))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .merge(
                Command::builder("remote")
                    .sub_command_with("add", |b| b.parameter(|p| p.name("url")).run(|_| Ok(())))
                    .sub_command_with("remove", |b| b.run(|_| Ok(())))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    fn complete(tree: &CompletionTree, line: &str) -> Completions {
        let tokenized = Tokenizer::default()
            .tokenize(line, line.len(), Mode::Complete)
            .unwrap();
        tree.complete(&tokenized).unwrap()
    }

    #[test]
    fn test_completes_top_level_names_and_aliases() {
        let tree = CompletionTree::build(&registry());
        assert_eq!(complete(&tree, "col").candidates, vec!["color", "colour"]);
        assert_eq!(complete(&tree, "").candidates, vec!["color", "colour", "remote"]);
    }

    #[test]
    fn test_completes_parameters_in_order() {
        let tree = CompletionTree::build(&registry());
        assert_eq!(complete(&tree, "colour g").candidates, vec!["green"]);
        assert_eq!(complete(&tree, "color red ").candidates, vec!["null"]);
        assert_eq!(complete(&tree, "color red dark").candidates, vec!["dark"]);
        assert!(complete(&tree, "color purple ").candidates.is_empty());
    }

    #[test]
    fn test_completes_sub_commands() {
        let tree = CompletionTree::build(&registry());
        assert_eq!(complete(&tree, "remote re").candidates, vec!["remove"]);
        let completions = complete(&tree, "remote add ");
        assert!(completions.candidates.is_empty());
        assert_eq!(completions.start, "remote add ".len());
        assert_eq!(complete(&tree, "remote add http").candidates, vec!["http"]);
    }

    #[test]
    fn test_unknown_prefix_has_no_candidates() {
        let tree = CompletionTree::build(&registry());
        assert!(complete(&tree, "nope x").candidates.is_empty());
    }

    #[test]
    fn test_replacement_starts_at_raw_word() {
        let tree = CompletionTree::build(&registry());
        let completions = complete(&tree, "color 'gr");
        assert_eq!(completions.start, 6);
        assert_eq!(completions.candidates, vec!["green"]);
    }

    #[test]
    fn test_custom_factory_replaces_parameter_chain() {
        let mut registry = Registry::new(true);
        registry
            .merge(
                Command::builder("open")
                    .parameter(|p| p.name("ignored").completer(StringsCompleter::new(["x"])))
                    .completer_factory(|_| vec![CompletionNode::names(["file", "folder"])])
                    .run(|_| Ok(()))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let tree = CompletionTree::build(&registry);
        assert_eq!(complete(&tree, "open f").candidates, vec!["file", "folder"]);
        assert!(complete(&tree, "open x").candidates.is_empty());
    }
}
