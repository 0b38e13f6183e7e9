//! Project files and raw script import/export.
//!
//! A project file is the portable tree of a [`Project`] with a
//! `schema_version` key beside the entity tag. Files without the key are
//! read as legacy projects; any other version is rejected.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::config::SctConfig;
use crate::error::{SctError, SctResult};
use crate::model::{Project, Script};
use crate::portable::{from_portable_as, to_export, to_portable};
use crate::version::{PROJECT_SCHEMA_VERSION, SCHEMA_VERSION_KEY, SCRIPT_EXTENSION};

fn with_schema_version(mut tree: Value) -> Value {
    if let Value::Object(map) = &mut tree {
        map.insert(
            SCHEMA_VERSION_KEY.to_string(),
            Value::from(PROJECT_SCHEMA_VERSION),
        );
    }
    tree
}

fn render(tree: &Value, pretty: bool) -> SctResult<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(tree)
    } else {
        serde_json::to_string(tree)
    };
    rendered.map_err(|err| SctError::ProjectFile {
        message: err.to_string(),
        src: String::new(),
        span: (0, 0).into(),
    })
}

/// Serializes a project to its project file text.
pub fn project_to_json(project: &Project, pretty: bool) -> SctResult<String> {
    render(&with_schema_version(to_portable(project)?), pretty)
}

/// Serializes a project with bare hex bytes for external tools.
///
/// The output is not accepted by [`project_from_json`].
pub fn export_json(project: &Project, pretty: bool) -> SctResult<String> {
    render(&with_schema_version(to_export(project)?), pretty)
}

pub fn project_from_json(input: &str) -> SctResult<Project> {
    project_from_json_with_config(input, &SctConfig::default())
}

/// Parses and validates a project file. Size limits and opcode strictness
/// come from `config`.
pub fn project_from_json_with_config(input: &str, config: &SctConfig) -> SctResult<Project> {
    let limits = &config.limits;
    if input.len() > limits.max_project_bytes {
        return Err(SctError::ResourceLimit(format!(
            "project file is {} bytes, limit is {}",
            input.len(),
            limits.max_project_bytes
        )));
    }
    let tree: Value =
        serde_json::from_str(input).map_err(|err| project_file_error(input, &err))?;
    let Value::Object(mut map) = tree else {
        return Err(SctError::type_mismatch("/", "project object", "non-object"));
    };
    match map.remove(SCHEMA_VERSION_KEY) {
        Some(Value::String(version)) if version == PROJECT_SCHEMA_VERSION => {}
        Some(Value::String(version)) => {
            return Err(SctError::Project(format!(
                "schema incompatible: found {version}, expected {PROJECT_SCHEMA_VERSION}"
            )))
        }
        Some(other) => {
            return Err(SctError::type_mismatch(
                &format!("/{SCHEMA_VERSION_KEY}"),
                "version string",
                other.to_string(),
            ))
        }
        // Allow legacy project files without version
        None => debug!("project file has no schema version"),
    }
    let project: Project = from_portable_as(&Value::Object(map))?;
    project.validate_with_config(config)?;
    Ok(project)
}

pub fn load_project(path: &Path) -> SctResult<Project> {
    load_project_with_config(path, &SctConfig::default())
}

#[instrument(skip(config))]
pub fn load_project_with_config(path: &Path, config: &SctConfig) -> SctResult<Project> {
    let content = fs::read_to_string(path).map_err(|err| SctError::io(path, err))?;
    let project = project_from_json_with_config(&content, config)?;
    info!(scripts = project.len(), "loaded project");
    Ok(project)
}

pub fn save_project(project: &Project, path: &Path) -> SctResult<()> {
    save_project_with_config(project, path, &SctConfig::default())
}

#[instrument(skip(project, config))]
pub fn save_project_with_config(
    project: &Project,
    path: &Path,
    config: &SctConfig,
) -> SctResult<()> {
    // Refuse to write a file that would not load back.
    project.validate_with_config(config)?;
    let json = project_to_json(project, config.pretty_json)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| SctError::io(parent, err))?;
    }
    fs::write(path, json).map_err(|err| SctError::io(path, err))?;
    info!(scripts = project.len(), "saved project");
    Ok(())
}

/// Reads every `*.sct` file directly inside `dir` into a new project,
/// named by file stem. Fails without a partial result if any file does
/// not decode.
#[instrument(skip(config))]
pub fn import_scripts(dir: &Path, config: &SctConfig) -> SctResult<Project> {
    let mut project = Project::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            SctError::io(path, err.into())
        })?;
        let path = entry.path();
        let is_script = path
            .extension()
            .is_some_and(|extension| extension == SCRIPT_EXTENSION);
        if !entry.file_type().is_file() || !is_script {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                SctError::Project(format!("script file name {} is not UTF-8", path.display()))
            })?;
        let bytes = fs::read(path).map_err(|err| SctError::io(path, err))?;
        debug!(name, bytes = bytes.len(), "importing script");
        project.add_script(Script::from_bytes_with_config(name, &bytes, config)?)?;
    }
    info!(scripts = project.len(), "imported scripts");
    Ok(project)
}

/// Writes every script to `dir/<name>.sct`. All scripts are encoded
/// before any file is written.
#[instrument(skip(project))]
pub fn export_scripts(project: &Project, dir: &Path) -> SctResult<Vec<PathBuf>> {
    let encoded = project
        .scripts()
        .map(|script| Ok((script.name.as_str(), script.to_bytes()?)))
        .collect::<SctResult<Vec<_>>>()?;
    fs::create_dir_all(dir).map_err(|err| SctError::io(dir, err))?;
    let mut written = Vec::with_capacity(encoded.len());
    for (name, bytes) in encoded {
        let path = dir.join(format!("{name}.{SCRIPT_EXTENSION}"));
        fs::write(&path, bytes).map_err(|err| SctError::io(&path, err))?;
        written.push(path);
    }
    info!(scripts = written.len(), "exported scripts");
    Ok(written)
}

/// Lines of context kept on each side of a JSON syntax error.
const CONTEXT_LINES: usize = 2;

/// Diagnostic for a JSON syntax error, with the source clipped to the
/// lines around it.
#[cold]
fn project_file_error(input: &str, err: &serde_json::Error) -> SctError {
    let lines: Vec<(usize, &str)> = input
        .split_inclusive('\n')
        .scan(0usize, |next, line| {
            let start = *next;
            *next += line.len();
            Some((start, line))
        })
        .collect();
    let last_row = lines.len().saturating_sub(1);
    let row = err.line().saturating_sub(1).min(last_row);
    let offset = lines.get(row).map_or(0, |(start, line)| {
        let column = err.column().saturating_sub(1);
        let within = line
            .char_indices()
            .nth(column)
            .map_or(line.len().saturating_sub(1), |(index, _)| index);
        start + within
    });

    let first = row.saturating_sub(CONTEXT_LINES);
    let last = (row + CONTEXT_LINES).min(last_row);
    let (start, end) = match (lines.get(first), lines.get(last)) {
        (Some((start, _)), Some((last_start, line))) => (*start, last_start + line.len()),
        _ => (0, input.len()),
    };
    let src = input[start..end].to_string();
    let local = offset - start;
    let length = usize::from(local < src.len());
    SctError::ProjectFile {
        message: err.to_string(),
        src,
        span: (local, length).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_points_at_the_error() {
        let input = "{\n  \"type\": \"project\",\n  \"scripts\": ]\n}";
        let err = project_from_json(input).unwrap_err();
        match err {
            SctError::ProjectFile { src, span, .. } => {
                assert_eq!(&src[span.offset()..span.offset() + 1], "]");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn syntax_error_window_keeps_nearby_lines_only() {
        let mut input = String::from("{\n");
        for index in 0..20 {
            input.push_str(&format!("  \"pad{index}\": {index},\n"));
        }
        input.push_str("  \"scripts\": ]\n}");
        match project_from_json(&input).unwrap_err() {
            SctError::ProjectFile { src, span, .. } => {
                assert_eq!(src.lines().count(), 4);
                assert!(!src.contains("pad0\""));
                assert_eq!(&src[span.offset()..span.offset() + 1], "]");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn newer_schema_is_rejected() {
        let input = r#"{"type": "project", "scripts": {}, "schema_version": "9.0"}"#;
        let err = project_from_json(input).unwrap_err();
        assert!(err.to_string().contains("schema incompatible: found 9.0"));
    }

    #[test]
    fn legacy_file_without_version_loads() {
        let project = project_from_json(r#"{"type": "project", "scripts": {}}"#).unwrap();
        assert!(project.is_empty());
    }

    #[test]
    fn oversized_input_hits_limit() {
        let mut config = SctConfig::default();
        config.limits.max_project_bytes = 8;
        let err = project_from_json_with_config(r#"{"type": "project"}"#, &config).unwrap_err();
        assert!(matches!(err, SctError::ResourceLimit(_)));
    }

    #[test]
    fn non_object_root_is_type_error() {
        let err = project_from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, SctError::SerializationType { .. }));
    }
}
