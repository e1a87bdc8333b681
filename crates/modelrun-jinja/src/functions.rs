//! Template functions
//!
//! `ref()` and `source()` only look up relations that were resolved during
//! static validation; they never discover new dependencies.

use minijinja::value::Kwargs;
use minijinja::{Error, ErrorKind, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Relation lookup for `ref('name')` / `ref('package', 'name')`
pub fn ref_function(
    relations: Arc<BTreeMap<String, String>>,
) -> impl Fn(String, Option<String>) -> Result<Value, Error> + Send + Sync + 'static {
    move |first: String, second: Option<String>| {
        // Two-argument form: ref('package', 'model')
        let name = second.unwrap_or(first);

        relations
            .get(&name)
            .map(|relation| Value::from_safe_string(relation.clone()))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("ref('{}') is not a literal dependency of this model", name),
                )
            })
    }
}

/// Relation lookup for `source('source', 'table')`
pub fn source_function(
    relations: Arc<BTreeMap<(String, String), String>>,
) -> impl Fn(String, String) -> Result<Value, Error> + Send + Sync + 'static {
    move |source: String, table: String| {
        relations
            .get(&(source.clone(), table.clone()))
            .map(|relation| Value::from_safe_string(relation.clone()))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("source('{}', '{}') is not a literal dependency of this model", source, table),
                )
            })
    }
}

/// `var('name')` or `var('name', default)`
pub fn var_function(
    vars: Arc<BTreeMap<String, serde_json::Value>>,
) -> impl Fn(String, Option<Value>) -> Result<Value, Error> + Send + Sync + 'static {
    move |name: String, default: Option<Value>| {
        if let Some(value) = vars.get(&name) {
            return Ok(Value::from_serialize(value));
        }

        default.ok_or_else(|| {
            Error::new(
                ErrorKind::UndefinedError,
                format!("Variable '{}' is not defined", name),
            )
        })
    }
}

/// `env_var('NAME')` or `env_var('NAME', 'default')`
pub fn env_var_function(name: String, default: Option<String>) -> Result<Value, Error> {
    std::env::var(&name)
        .ok()
        .or(default)
        .map(Value::from)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::UndefinedError,
                format!("Environment variable '{}' is not set", name),
            )
        })
}

/// `config(...)` was already read statically; it renders to nothing
pub fn config_function(kwargs: Kwargs) -> Result<Value, Error> {
    // Mark every argument as used so MiniJinja does not reject them
    let keys: Vec<String> = kwargs.args().map(String::from).collect();
    for key in &keys {
        let _: Value = kwargs.get(key)?;
    }
    Ok(Value::from(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_single_and_package_form() {
        let mut relations = BTreeMap::new();
        relations.insert("orders".to_string(), "\"main\".\"orders\"".to_string());
        let f = ref_function(Arc::new(relations));

        assert_eq!(f("orders".into(), None).unwrap().to_string(), "\"main\".\"orders\"");
        assert_eq!(
            f("pkg".into(), Some("orders".into())).unwrap().to_string(),
            "\"main\".\"orders\""
        );
        assert!(f("customers".into(), None).is_err());
    }

    #[test]
    fn source_lookup() {
        let mut relations = BTreeMap::new();
        relations.insert(("raw".to_string(), "orders".to_string()), "\"raw\".\"orders\"".to_string());
        let f = source_function(Arc::new(relations));

        assert_eq!(f("raw".into(), "orders".into()).unwrap().to_string(), "\"raw\".\"orders\"");
        assert!(f("raw".into(), "payments".into()).is_err());
    }

    #[test]
    fn var_with_project_value_and_default() {
        let mut vars = BTreeMap::new();
        vars.insert("start_date".to_string(), serde_json::json!("2024-01-01"));
        let f = var_function(Arc::new(vars));

        assert_eq!(f("start_date".into(), None).unwrap().to_string(), "2024-01-01");
        assert_eq!(f("missing".into(), Some(Value::from(7))).unwrap(), Value::from(7));
        assert!(f("missing".into(), None).is_err());
    }

    #[test]
    fn env_var_default() {
        let value = env_var_function("MODELRUN_TEST_SURELY_UNSET".into(), Some("fallback".into())).unwrap();
        assert_eq!(value.to_string(), "fallback");
        assert!(env_var_function("MODELRUN_TEST_SURELY_UNSET".into(), None).is_err());
    }
}
