//! `{{ config(...) }}` directive parsing
//!
//! Reads model configuration from the template without rendering it.
//! `materialized` and `schema` must be string literals; any other keyword is
//! skipped whatever its value (lists and dicts included).

use modelrun_core::Materialization;
use regex::Regex;
use std::sync::OnceLock;
use crate::refs::{literal, template_blocks};

/// Configuration declared inside a model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDirective {
    pub materialized: Option<Materialization>,

    pub schema: Option<String>,

    /// Keys that were present but have no meaning here
    pub ignored: Vec<String>,
}

impl ConfigDirective {
    /// Parse every `config()` call in the source; later calls override earlier ones
    pub fn parse(sql: &str) -> Result<Option<Self>, DirectiveError> {
        let mut directive: Option<Self> = None;

        for block in template_blocks(sql) {
            for call in call_pattern().captures_iter(&block) {
                let args = call.get(1).map(|m| m.as_str()).unwrap_or_default();
                let parsed = directive.get_or_insert_with(Self::default);
                parsed.apply_arguments(args)?;
            }
        }

        Ok(directive)
    }

    fn apply_arguments(&mut self, args: &str) -> Result<(), DirectiveError> {
        for argument in split_top_level(args) {
            let caps = kwarg_pattern().captures(argument).ok_or_else(|| {
                DirectiveError::Malformed(format!("unsupported config() arguments: {}", args.trim()))
            })?;
            let key = &caps[1];
            let value = caps[2].trim();

            match key {
                "materialized" => {
                    let value = string_literal(value).ok_or_else(|| DirectiveError::NonLiteral(key.to_string()))?;
                    let materialization = value
                        .parse::<Materialization>()
                        .map_err(DirectiveError::UnknownMaterialization)?;
                    self.materialized = Some(materialization);
                }
                "schema" => {
                    let value = string_literal(value).ok_or_else(|| DirectiveError::NonLiteral(key.to_string()))?;
                    if value.trim().is_empty() {
                        return Err(DirectiveError::Malformed("schema must not be empty".to_string()));
                    }
                    self.schema = Some(value);
                }
                other => {
                    if !self.ignored.iter().any(|k| k == other) {
                        self.ignored.push(other.to_string());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Split call arguments on commas outside quotes and brackets
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);

    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Contents of a single- or double-quoted literal, `None` for anything else
fn string_literal(value: &str) -> Option<String> {
    let caps = literal_pattern().captures(value)?;
    literal(&caps, 1, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("{0}")]
    UnknownMaterialization(String),

    #[error("config value for '{0}' must be a string literal")]
    NonLiteral(String),

    #[error("{0}")]
    Malformed(String),
}

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\bconfig\s*\((.*)\)").expect("valid config regex"))
}

fn kwarg_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)^\s*(\w+)\s*=(.+)$").expect("valid kwarg regex"))
}

fn literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^(?:'([^']*)'|"([^"]*)")$"#).expect("valid literal regex"))
}
