//! Reference extraction
//!
//! Finds `{{ ref('model') }}` and `{{ source('source', 'table') }}` markers
//! with a purely syntactic scan. Only template blocks (`{{ }}` and `{% %}`)
//! are searched; template comments (`{# #}`) are ignored.

use modelrun_core::Reference;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Extracts model and source references from templated SQL
pub struct ReferenceExtractor;

impl ReferenceExtractor {
    /// Extract all references from SQL, deduplicated and sorted
    ///
    /// Examples of recognised markers:
    /// - `ref('users')`, `ref("users")`
    /// - `ref('package', 'users')` (resolves by the model name)
    /// - `source('raw', 'users')`
    ///
    /// Non-literal arguments (`ref(some_var)`) are not references.
    pub fn extract(sql: &str) -> BTreeSet<Reference> {
        let mut references = BTreeSet::new();

        for block in template_blocks(sql) {
            for caps in ref_pattern().captures_iter(&block) {
                let first = literal(&caps, 1, 2);
                let second = literal(&caps, 3, 4);

                // Two-argument form: ref('package', 'model')
                if let Some(name) = second.or(first) {
                    references.insert(Reference::model(name));
                }
            }

            for caps in source_pattern().captures_iter(&block) {
                if let (Some(source), Some(table)) = (literal(&caps, 1, 2), literal(&caps, 3, 4)) {
                    references.insert(Reference::source(source, table));
                }
            }
        }

        references
    }

    /// Names passed to `ref()`, in sorted order
    pub fn model_refs(sql: &str) -> Vec<String> {
        Self::extract(sql)
            .into_iter()
            .filter_map(|r| match r {
                Reference::Ref { name } => Some(name),
                Reference::Source { .. } => None,
            })
            .collect()
    }
}

/// Contents of every `{{ }}` and `{% %}` block, with comments removed first
pub(crate) fn template_blocks(sql: &str) -> Vec<String> {
    let without_comments = comment_pattern().replace_all(sql, "");

    block_pattern()
        .captures_iter(&without_comments)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First matching alternative of a single- or double-quoted literal
pub(crate) fn literal(caps: &regex::Captures<'_>, single: usize, double: usize) -> Option<String> {
    caps.get(single)
        .or_else(|| caps.get(double))
        .map(|m| m.as_str().to_string())
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{#.*?#\}").expect("valid comment regex"))
}

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\{\{-?(.*?)-?\}\}|\{%-?(.*?)-?%\}").expect("valid block regex")
    })
}

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"\bref\s*\(\s*(?:'([^']*)'|"([^"]*)")\s*(?:,\s*(?:'([^']*)'|"([^"]*)")\s*)?\)"#,
        )
        .expect("valid ref regex")
    })
}

fn source_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"\bsource\s*\(\s*(?:'([^']*)'|"([^"]*)")\s*,\s*(?:'([^']*)'|"([^"]*)")\s*\)"#,
        )
        .expect("valid source regex")
    })
}
