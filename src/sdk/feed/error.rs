use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("GTFS directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Missing required GTFS files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),

    #[error("Failed to open {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
}
