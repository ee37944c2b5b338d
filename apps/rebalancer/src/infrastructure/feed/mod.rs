//! File-based recommendation feed.
//!
//! Reads recommendation payloads from JSON files on disk and normalizes them
//! into a single [`RecommendationSet`]. Multiple source files are merged with
//! higher-scored duplicates winning.
//!
//! Feed problems are fatal to a pass: a missing or malformed file means the
//! input cannot be trusted, and acting on a partial view would silently exit
//! positions the missing source still recommends.

use std::path::{Path, PathBuf};

use crate::domain::recommendation::{PayloadError, RecommendationSet};

/// Errors loading recommendation files.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// File could not be read.
    #[error("Failed to read recommendations from {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        /// Path that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// JSON parsed but carried no recognizable recommendation list.
    #[error("Unrecognized payload shape in {path}: {source}")]
    Payload {
        /// Path that failed.
        path: PathBuf,
        /// Underlying payload error.
        #[source]
        source: PayloadError,
    },
}

/// Loads and merges recommendation payloads from JSON files.
#[derive(Debug, Clone)]
pub struct FileRecommendationFeed {
    paths: Vec<PathBuf>,
}

impl FileRecommendationFeed {
    /// Create a feed over the given source files.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Load all sources and merge them into one set.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable, unparseable, or shape-unrecognized
    /// file; nothing partial is returned.
    pub fn load(&self) -> Result<RecommendationSet, FeedError> {
        let mut merged = RecommendationSet::new();
        for path in &self.paths {
            let set = load_file(path)?;
            tracing::info!(
                path = %path.display(),
                count = set.len(),
                "Loaded recommendations"
            );
            merged = merged.merge(set);
        }
        Ok(merged)
    }
}

fn load_file(path: &Path) -> Result<RecommendationSet, FeedError> {
    let text = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let payload: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| FeedError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    RecommendationSet::from_payload(&payload).map_err(|source| FeedError::Payload {
        path: path.to_path_buf(),
        source,
    })
}
