//! Manifest files
//!
//! A manifest holds one or more resources, each tagged by `kind`. JSON files
//! carry a single object or an array of them; YAML files may hold several
//! `---` separated documents.

use crate::error::{TypesError, TypesResult};
use crate::job::Job;
use crate::meta::{ObjectKey, ObjectMeta, Resource};
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One resource read from a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Manifest {
    Workflow(Workflow),
    Job(Job),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Workflow(_) => Workflow::KIND,
            Manifest::Job(_) => Job::KIND,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Workflow(w) => &w.metadata,
            Manifest::Job(j) => &j.metadata,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// Format implied by a `.json`, `.yaml` or `.yml` extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ManifestFormat::Json),
            "yaml" | "yml" => Some(ManifestFormat::Yaml),
            _ => None,
        }
    }
}

/// Parse every resource in `input`
pub fn parse_manifests(input: &str, format: ManifestFormat) -> TypesResult<Vec<Manifest>> {
    let invalid = |reason: String| TypesError::Manifest {
        path: "<input>".to_string(),
        reason,
    };

    match format {
        ManifestFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(input).map_err(|e| invalid(e.to_string()))?;
            match value {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(|item| serde_json::from_value(item).map_err(|e| invalid(e.to_string())))
                    .collect(),
                other => Ok(vec![
                    serde_json::from_value(other).map_err(|e| invalid(e.to_string()))?
                ]),
            }
        }
        ManifestFormat::Yaml => {
            let mut manifests = Vec::new();
            for document in serde_yaml::Deserializer::from_str(input) {
                let value =
                    serde_yaml::Value::deserialize(document).map_err(|e| invalid(e.to_string()))?;
                if value.is_null() {
                    continue;
                }
                manifests.push(serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?);
            }
            Ok(manifests)
        }
    }
}

/// Read one manifest file; the format comes from its extension
pub fn read_manifest_file(path: &Path) -> TypesResult<Vec<Manifest>> {
    let display = path.display().to_string();
    let format = ManifestFormat::from_path(path).ok_or_else(|| TypesError::Manifest {
        path: display.clone(),
        reason: "expected a .json, .yaml or .yml file".to_string(),
    })?;
    let input = std::fs::read_to_string(path).map_err(|e| TypesError::Manifest {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    parse_manifests(&input, format).map_err(|e| match e {
        TypesError::Manifest { reason, .. } => TypesError::Manifest {
            path: display,
            reason,
        },
        other => other,
    })
}

/// Read every manifest file directly inside `dir`, in file name order
///
/// Files without a manifest extension are skipped.
pub fn read_manifest_dir(dir: &Path) -> TypesResult<Vec<Manifest>> {
    let entries = std::fs::read_dir(dir).map_err(|e| TypesError::Manifest {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ManifestFormat::from_path(path).is_some())
        .collect();
    files.sort();

    let mut manifests = Vec::new();
    for file in files {
        manifests.extend(read_manifest_file(&file)?);
    }
    Ok(manifests)
}
