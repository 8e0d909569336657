use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::ParseError;

/// Contents of a `Godeps/Godeps.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub import_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub godep_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default)]
    pub deps: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dependency {
    pub import_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub rev: String,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Manifest, ParseError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ParseError::IO {
            path: path.to_path_buf(),
            source,
        })?;
        Manifest::from_json_str(&contents)
    }

    pub fn from_json_str(data: &str) -> Result<Manifest, ParseError> {
        let manifest = serde_json::from_str::<Manifest>(data)?;
        if let Some(dependency) = manifest.deps.iter().find(|d| d.rev.trim().is_empty()) {
            return Err(ParseError::MissingRevision(dependency.import_path.clone()));
        }
        Ok(manifest)
    }
}
