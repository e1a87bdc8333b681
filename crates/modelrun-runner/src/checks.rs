//! Validation checks
//!
//! A check is a query whose single value is compared with an expected JSON
//! scalar after a build, e.g. "the summary has 4 rows".

use modelrun_core::{CheckConfig, Diagnostic, DiagnosticCode, Severity};
use modelrun_warehouse::Engine;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub expected: Value,

    /// Value the query returned, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,

    /// Engine error, if the query failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self
                .actual
                .as_ref()
                .is_some_and(|actual| values_match(&self.expected, actual))
    }

    /// Diagnostic for a failed check, `None` if it passed
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        if self.passed() {
            return None;
        }

        let diagnostic = match (&self.actual, &self.error) {
            (_, Some(error)) => Diagnostic::new(
                DiagnosticCode::CheckFailed,
                Severity::Error,
                format!("Check '{}' could not run: {}", self.name, error),
            ),
            (Some(actual), None) => Diagnostic::new(
                DiagnosticCode::CheckFailed,
                Severity::Error,
                format!("Check '{}' returned an unexpected value", self.name),
            )
            .with_comparison(self.expected.to_string(), actual.to_string()),
            (None, None) => Diagnostic::new(
                DiagnosticCode::CheckFailed,
                Severity::Error,
                format!("Check '{}' returned nothing", self.name),
            ),
        };

        Some(diagnostic)
    }
}

/// Run every check in order; failures do not stop later checks
pub async fn run_checks(engine: &dyn Engine, checks: &[CheckConfig]) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::with_capacity(checks.len());

    for check in checks {
        let outcome = match engine.query_scalar(&check.sql).await {
            Ok(actual) => CheckOutcome {
                name: check.name.clone(),
                expected: check.expected.clone(),
                actual: Some(actual),
                error: None,
            },
            Err(e) => CheckOutcome {
                name: check.name.clone(),
                expected: check.expected.clone(),
                actual: None,
                error: Some(e.to_string()),
            },
        };

        if outcome.passed() {
            tracing::info!(check = %check.name, "check passed");
        } else {
            tracing::warn!(check = %check.name, expected = %outcome.expected, actual = ?outcome.actual, "check failed");
        }
        outcomes.push(outcome);
    }

    outcomes
}

/// Numbers compare by value (`4` matches `4.0`); everything else exactly
fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => match (e.as_f64(), a.as_f64()) {
            (Some(e), Some(a)) => e == a,
            _ => e == a,
        },
        // DuckDB returns DECIMAL as text
        (Value::Number(e), Value::String(a)) => a
            .trim()
            .parse::<f64>()
            .ok()
            .zip(e.as_f64())
            .is_some_and(|(a, e)| a == e),
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrun_warehouse::MockEngineBuilder;
    use serde_json::json;

    fn check(name: &str, sql: &str, expected: Value) -> CheckConfig {
        CheckConfig {
            name: name.to_string(),
            sql: sql.to_string(),
            expected,
        }
    }

    #[test]
    fn test_values_match() {
        assert!(values_match(&json!(4), &json!(4)));
        assert!(values_match(&json!(4), &json!(4.0)));
        assert!(values_match(&json!(12.5), &json!("12.50")));
        assert!(values_match(&json!("ok"), &json!("ok")));
        assert!(!values_match(&json!(4), &json!(5)));
        assert!(!values_match(&json!("4"), &json!(4)));
        assert!(!values_match(&json!(true), &json!(1)));
    }

    #[tokio::test]
    async fn test_run_checks() {
        let engine = MockEngineBuilder::new()
            .with_scalar("select count(*) from summary", json!(4))
            .with_scalar("select max(amount) from summary", json!(99))
            .build();

        let outcomes = run_checks(
            &engine,
            &[
                check("row_count", "select count(*) from summary", json!(4)),
                check("max_amount", "select max(amount) from summary", json!(100)),
                check("missing", "select 1 from nowhere", json!(1)),
            ],
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed());
        assert!(outcomes[0].to_diagnostic().is_none());

        assert!(!outcomes[1].passed());
        let diagnostic = outcomes[1].to_diagnostic().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::CheckFailed);
        assert_eq!(diagnostic.expected.as_deref(), Some("100"));
        assert_eq!(diagnostic.actual.as_deref(), Some("99"));

        assert!(!outcomes[2].passed());
        assert!(outcomes[2].error.is_some());
    }
}
