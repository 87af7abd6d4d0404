use std::path::PathBuf;

use crate::tokenizer::TokenizerConfig;

/// Interpreter settings.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Application name, used for the default prompt and history file.
    pub name: String,
    /// Prompt override; `"<name>$ "` when unset.
    pub prompt: Option<String>,
    /// Fail on conflicting command registrations instead of keeping the first one.
    pub strict: bool,
    /// Where the interactive history is kept; `None` disables persistence.
    pub history_file: Option<PathBuf>,
    /// Whether output may carry ANSI colors.
    pub color: bool,
    /// Column budget of the help text.
    pub help_width: usize,
    pub tokenizer: TokenizerConfig,
}

impl CliConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            history_file: Some(PathBuf::from(format!(".{}-history", name.to_lowercase()))),
            name,
            prompt: None,
            strict: true,
            color: true,
            help_width: 80,
            tokenizer: TokenizerConfig::default(),
        }
    }

    pub fn prompt(&self) -> String {
        self.prompt
            .clone()
            .unwrap_or_else(|| format!("{}$ ", self.name))
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_history_file(mut self, history_file: Option<PathBuf>) -> Self {
        self.history_file = history_file;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_help_width(mut self, help_width: usize) -> Self {
        self.help_width = help_width;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new("shell")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_derive_from_name() {
        let config = CliConfig::new("MyApp");
        assert_eq!(config.prompt(), "MyApp$ ");
        assert_eq!(config.history_file, Some(PathBuf::from(".myapp-history")));
        assert!(config.strict);
        assert!(config.color);
        assert_eq!(config.help_width, 80);
    }

    #[test]
    fn test_overrides() {
        let config = CliConfig::default()
            .with_prompt("> ")
            .with_strict(false)
            .with_history_file(None)
            .with_color(false);
        assert_eq!(config.prompt(), "> ");
        assert!(!config.strict);
        assert!(config.history_file.is_none());
        assert!(!config.color);
    }
}
