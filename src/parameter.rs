//! Positional command parameters.
//!
//! A parameter owns a parser that pulls its value from the [`CommandLine`] cursor. Parsers
//! may consume any number of words, from none at all to the whole remainder of the line.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::trace;

use crate::completion::{NullableCompleter, PassthroughCompleter, WordCompleter};
use crate::cursor::CommandLine;
use crate::error::ParameterError;

/// Parser for one parameter value.
pub type ParserFn =
    dyn Fn(&ParameterSpec, &mut dyn CommandLine) -> anyhow::Result<Value> + Send + Sync;

/// A parsed parameter value. `null` carries no value.
pub struct Value(Option<Box<dyn Any + Send>>);

impl Value {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The value, if present and of type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("null"),
            Some(_) => f.write_str("Value(..)"),
        }
    }
}

/// Declaration of one positional parameter.
#[derive(Clone)]
pub struct ParameterSpec {
    index: usize,
    name: String,
    description: Option<String>,
    completer: Arc<dyn WordCompleter>,
    parser: Arc<ParserFn>,
    nullable: bool,
}

impl ParameterSpec {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn completer(&self) -> &Arc<dyn WordCompleter> {
        &self.completer
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Run the parser against the line.
    pub fn parse(&self, line: &mut dyn CommandLine) -> Result<ParsedParameter, ParameterError> {
        let value = (self.parser)(self, line).map_err(|source| ParameterError {
            name: self.name.clone(),
            source,
        })?;
        trace!(parameter = %self.name, null = value.is_null(), "parsed parameter");
        Ok(ParsedParameter {
            spec: self.clone(),
            value,
        })
    }
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// A parameter together with the value parsed for it.
#[derive(Debug)]
pub struct ParsedParameter {
    spec: ParameterSpec,
    value: Value,
}

impl ParsedParameter {
    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Builder for a [`ParameterSpec`], handed to `CommandBuilder::parameter`.
pub struct ParameterBuilder {
    index: usize,
    name: Option<String>,
    description: Option<String>,
    completer: Option<Arc<dyn WordCompleter>>,
    parser: Arc<ParserFn>,
    default: Option<String>,
    nullable: bool,
}

impl ParameterBuilder {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            name: None,
            description: None,
            completer: None,
            parser: parsers::passthrough(),
            default: None,
            nullable: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn completer(mut self, completer: impl WordCompleter + 'static) -> Self {
        self.completer = Some(Arc::new(completer));
        self
    }

    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&ParameterSpec, &mut dyn CommandLine) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.parser = Arc::new(parser);
        self
    }

    /// Parse the next word with [`FromStr`].
    pub fn parse_as<T>(mut self) -> Self
    where
        T: FromStr + Send + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.parser = parsers::parse::<T>();
        self
    }

    /// Take the raw remainder of the line.
    pub fn flush(mut self) -> Self {
        self.parser = parsers::flush();
        self
    }

    /// Substitute `default` when the word is blank or missing.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Accept a blank word or the literal `null` as a null value, and offer `null` as a
    /// completion.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub(crate) fn build(self) -> ParameterSpec {
        let mut parser = self.parser;
        let mut completer = self
            .completer
            .unwrap_or_else(|| Arc::new(PassthroughCompleter));
        if self.nullable {
            parser = parsers::nullable(parser);
            completer = Arc::new(NullableCompleter::new(completer));
        }
        if let Some(default) = self.default {
            parser = parsers::with_default(default, parser);
        }
        ParameterSpec {
            index: self.index,
            name: self.name.unwrap_or_else(|| self.index.to_string()),
            description: self.description,
            completer,
            parser,
            nullable: self.nullable,
        }
    }
}

/// Stock parsers and parser combinators.
pub mod parsers {
    use std::str::FromStr;
    use std::sync::Arc;

    use anyhow::{Context, anyhow};

    use super::{ParameterSpec, ParserFn, Value};
    use crate::cursor::{CommandLine, DefaultedLine};

    /// The next word, as a `String`.
    pub fn passthrough() -> Arc<ParserFn> {
        Arc::new(|_: &ParameterSpec, line: &mut dyn CommandLine| {
            line.next_word()
                .map(Value::new)
                .ok_or_else(|| anyhow!("missing value"))
        })
    }

    /// The next word, converted with [`FromStr`].
    pub fn parse<T>() -> Arc<ParserFn>
    where
        T: FromStr + Send + 'static,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Arc::new(|_: &ParameterSpec, line: &mut dyn CommandLine| {
            let word = line.next_word().ok_or_else(|| anyhow!("missing value"))?;
            let value = word
                .parse::<T>()
                .with_context(|| format!("invalid value '{word}'"))?;
            Ok(Value::new(value))
        })
    }

    /// The raw remainder of the line, as a `String`.
    pub fn flush() -> Arc<ParserFn> {
        Arc::new(|_: &ParameterSpec, line: &mut dyn CommandLine| Ok(Value::new(line.flush())))
    }

    /// Blank words and `null` parse to null, anything else goes to `inner`.
    pub fn nullable(inner: Arc<ParserFn>) -> Arc<ParserFn> {
        Arc::new(move |spec: &ParameterSpec, line: &mut dyn CommandLine| {
            let is_null = line
                .peek()
                .is_none_or(|word| word.trim().is_empty() || word == "null");
            if is_null {
                line.next_word();
                return Ok(Value::null());
            }
            inner(spec, line)
        })
    }

    /// Run `inner` on a line whose blank or missing first word reads as `default`.
    pub fn with_default(default: String, inner: Arc<ParserFn>) -> Arc<ParserFn> {
        Arc::new(move |spec: &ParameterSpec, line: &mut dyn CommandLine| {
            let mut line = DefaultedLine::new(line, &default);
            inner(spec, &mut line)
        })
    }
}
