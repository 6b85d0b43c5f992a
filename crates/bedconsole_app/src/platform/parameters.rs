//! Parameter files: a RON map `section -> field -> value`, replayed as field
//! edits so coercion matches interactive editing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bedconsole_core::{Msg, Section, UnknownSection};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ParametersError {
    #[error("failed to read parameters {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse parameters {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    Section(#[from] UnknownSection),
}

/// Any scalar or list a user may write; turned back into raw text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl RawValue {
    fn into_raw(self) -> String {
        match self {
            RawValue::Flag(value) => value.to_string(),
            RawValue::Integer(value) => value.to_string(),
            RawValue::Number(value) => value.to_string(),
            RawValue::Text(value) => value,
            RawValue::List(items) => items.join(","),
        }
    }
}

type RawDocument = BTreeMap<String, BTreeMap<String, RawValue>>;

pub fn load(path: &Path) -> Result<Vec<Msg>, ParametersError> {
    let text = fs::read_to_string(path).map_err(|source| ParametersError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text).map_err(|err| match err {
        ParametersError::Parse { source, .. } => ParametersError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Field edits ordered by section, then by field name.
pub fn parse(text: &str) -> Result<Vec<Msg>, ParametersError> {
    let raw: RawDocument = ron::from_str(text).map_err(|source| ParametersError::Parse {
        path: PathBuf::new(),
        source,
    })?;
    let mut edits = Vec::new();
    for (section_name, fields) in raw {
        let section: Section = section_name.parse()?;
        for (field, value) in fields {
            edits.push(Msg::FieldEdited {
                section,
                field,
                raw: value.into_raw(),
            });
        }
    }
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_become_raw_field_edits() {
        let edits = parse(
            r#"{
                "bed": { "diameter": 0.08, "material": "glass" },
                "export": { "formats": ["stl_binary", "obj"], "manifold_check": false },
                "particles": { "count": 250 },
            }"#,
        )
        .unwrap();
        let raw: Vec<(Section, String, String)> = edits
            .into_iter()
            .filter_map(|msg| match msg {
                Msg::FieldEdited {
                    section,
                    field,
                    raw,
                } => Some((section, field, raw)),
                _ => None,
            })
            .collect();
        assert_eq!(
            raw,
            vec![
                (Section::Bed, "diameter".to_string(), "0.08".to_string()),
                (Section::Bed, "material".to_string(), "glass".to_string()),
                (Section::Export, "formats".to_string(), "stl_binary,obj".to_string()),
                (Section::Export, "manifold_check".to_string(), "false".to_string()),
                (Section::Particles, "count".to_string(), "250".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(matches!(
            parse(r#"{ "reactor": { "size": 1 } }"#),
            Err(ParametersError::Section(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.ron")).unwrap_err();
        assert!(matches!(err, ParametersError::Read { .. }));
    }
}
