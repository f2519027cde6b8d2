//! Flat search-engine records and the collection schema describing them.

use serde::{Deserialize, Serialize};

/// One chunk joined with its document info, strategy parameters and the
/// processing telemetry of the unit that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexableRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub extraction_method: String,
    /// Strategy from the artifact's file name.
    pub chunking_strategy: String,
    /// Strategy recorded on the chunk itself.
    pub strategy_name: String,
    pub content: String,
    pub chunk_index: usize,
    pub token_count: usize,
    pub total_chunks: usize,
    pub chunk_size: Option<u64>,
    pub chunk_overlap: Option<u64>,
    pub encoding_name: Option<String>,
    pub preprocessing_method: String,
    pub content_length: usize,
    pub processing_time: f64,
    pub memory_usage: f64,
    pub cpu_usage_percent: f64,
    pub gpu_usage_percent: f64,
    pub start_position: usize,
    pub end_position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "float")]
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub facet: bool,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub default_sorting_field: String,
}

const FIELDS: &[(&str, FieldType, bool, bool)] = &[
    // name, type, facet, optional
    ("chunk_id", FieldType::String, false, false),
    ("document_id", FieldType::String, true, false),
    ("document_title", FieldType::String, true, false),
    ("extraction_method", FieldType::String, true, false),
    ("chunking_strategy", FieldType::String, true, false),
    ("strategy_name", FieldType::String, true, false),
    ("content", FieldType::String, false, false),
    ("chunk_index", FieldType::Int32, true, false),
    ("token_count", FieldType::Int32, true, false),
    ("total_chunks", FieldType::Int32, true, false),
    ("chunk_size", FieldType::Int32, true, true),
    ("chunk_overlap", FieldType::Int32, true, true),
    ("encoding_name", FieldType::String, true, true),
    ("preprocessing_method", FieldType::String, true, false),
    ("content_length", FieldType::Int32, false, false),
    ("processing_time", FieldType::Float, false, false),
    ("memory_usage", FieldType::Float, false, false),
    ("cpu_usage_percent", FieldType::Float, false, false),
    ("gpu_usage_percent", FieldType::Float, false, false),
    ("start_position", FieldType::Int32, false, false),
    ("end_position", FieldType::Int32, false, false),
    ("source_file", FieldType::String, true, true),
];

/// Schema of a collection holding [`IndexableRecord`]s, sorted by chunk index.
pub fn collection_schema(name: &str) -> CollectionSchema {
    CollectionSchema {
        name: name.to_string(),
        fields: FIELDS
            .iter()
            .map(|&(name, field_type, facet, optional)| FieldSchema {
                name: name.to_string(),
                field_type,
                facet,
                optional,
            })
            .collect(),
        default_sorting_field: "chunk_index".to_string(),
    }
}
