use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    /// Unreadable artifact, or one missing the sections a record needs.
    /// The artifact is skipped; the batch continues.
    #[error("format mismatch in {path}: {reason}")]
    FormatMismatch { path: String, reason: String },

    /// A processed document has no artifact for the requested combination.
    #[error("no {strategy} artifact for {document_id} ({extraction_method})")]
    MissingArtifact {
        document_id: String,
        extraction_method: String,
        strategy: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
