use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// One structural element produced by an extractor (title, paragraph, table, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type", alias = "element_type")]
    pub element_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Extractor-specific metadata; some backends nest `page_number` here.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Element {
    pub fn new(element_type: &str, text: &str) -> Self {
        Self {
            element_type: element_type.to_string(),
            text: text.to_string(),
            page_number: None,
            metadata: Map::new(),
        }
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    /// Page number from the element itself or its metadata.
    pub fn page(&self) -> Option<u32> {
        self.page_number.or_else(|| {
            self.metadata
                .get("page_number")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok())
        })
    }
}

/// Output of a document extractor: the read-only input of every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default)]
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    #[serde(default, alias = "processing_method")]
    pub preprocessing_method: String,
    #[serde(default, alias = "file_path", skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl ExtractedDocument {
    pub fn new(document_id: &str, full_text: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            title: String::new(),
            authors: Vec::new(),
            full_text: full_text.to_string(),
            elements: Vec::new(),
            preprocessing_method: String::new(),
            source_file: None,
        }
    }

    /// Read an extracted document from its JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn has_elements(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Character length of `full_text`.
    pub fn content_length(&self) -> usize {
        self.full_text.chars().count()
    }
}
