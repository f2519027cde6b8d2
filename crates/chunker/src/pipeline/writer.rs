use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use chunklab_core::{ArtifactKey, ChunkArtifact};

/// Persists chunk artifacts into one flat output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Atomically write one artifact.
    ///
    /// Writes to a hidden `.tmp` file first, then renames over the final path
    /// so readers never see a partial artifact.
    pub fn write(&self, key: &ArtifactKey, artifact: &ChunkArtifact) -> io::Result<PathBuf> {
        let file_name = key.file_name();
        let final_path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_vec_pretty(artifact).map_err(io::Error::other)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(
            document_id = %key.document_id,
            strategy = %key.strategy,
            chunks = artifact.total_chunks(),
            path = %final_path.display(),
            "wrote chunk artifact"
        );
        Ok(final_path)
    }
}
