//! Starter project written by `modelrun init`

use anyhow::{bail, Context, Result};
use modelrun_core::config::CONFIG_FILE_NAME;
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = r#"name = "{name}"
model_paths = ["models"]
target_path = "target"

[target]
path = "{name}.duckdb"
schema = "main"

[models]
materialized = "view"

[[checks]]
name = "first_model_has_four_rows"
sql = 'SELECT COUNT(*) FROM "main"."my_first_model"'
expected = 4
"#;

const FIRST_MODEL: &str = "{{ config(materialized='table') }}

select *
from (
    values (1, 'one'), (2, 'two'), (3, 'three'), (null, 'missing')
) as source_data(id, label)
";

const SECOND_MODEL: &str = "select *
from {{ ref('my_first_model') }}
where id = 1
";

/// Write a starter project into `dir`; returns the files created
pub fn init_project(dir: &Path) -> Result<Vec<PathBuf>> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!("{} already exists, refusing to overwrite", config_path.display());
    }

    let models_dir = dir.join("models");
    std::fs::create_dir_all(&models_dir)
        .with_context(|| format!("Failed to create {}", models_dir.display()))?;
    let name = project_name(dir);

    let files = [
        (config_path, CONFIG_TEMPLATE.replace("{name}", &name)),
        (models_dir.join("my_first_model.sql"), FIRST_MODEL.to_string()),
        (models_dir.join("my_second_model.sql"), SECOND_MODEL.to_string()),
    ];

    let mut created = Vec::new();
    for (path, contents) in files {
        if path.exists() {
            tracing::warn!(path = %path.display(), "keeping existing file");
            continue;
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        created.push(path);
    }

    Ok(created)
}

/// Directory name reduced to identifier characters
fn project_name(dir: &Path) -> String {
    let raw = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();

    if name.trim_matches('_').is_empty() {
        "my_project".to_string()
    } else {
        name
    }
}
