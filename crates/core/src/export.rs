//! Export filter and format vocabulary.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which annotations an export includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFilter {
    #[default]
    All,
    /// At least one drug or adverse event.
    Annotated,
    Validated,
    AnnotatedValidated,
    /// At least one recorded change event.
    Modified,
}

impl ExportFilter {
    pub const ALL: [ExportFilter; 5] = [
        Self::All,
        Self::Annotated,
        Self::Validated,
        Self::AnnotatedValidated,
        Self::Modified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Annotated => "annotated",
            Self::Validated => "validated",
            Self::AnnotatedValidated => "annotated_validated",
            Self::Modified => "modified",
        }
    }
}

impl FromStr for ExportFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|f| f.as_str() == s).ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid export filter '{s}'. Must be one of: all, annotated, validated, \
                 annotated_validated, modified"
            ))
        })
    }
}

/// Record shape of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Flat,
    Entities,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Entities => "entities",
        }
    }

    /// Download file name for this format.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Flat => "exported_annotations.jsonl",
            Self::Entities => "exported_annotations_entities.jsonl",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Self::Flat),
            "entities" => Ok(Self::Entities),
            other => Err(CoreError::Validation(format!(
                "Invalid export format '{other}'. Must be one of: flat, entities"
            ))),
        }
    }
}
