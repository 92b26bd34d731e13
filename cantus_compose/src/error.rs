// Crate-wide error type.
//
// Two families only: resource errors (files that are missing, unreadable, or
// already exist) and semantic configuration errors (names that resolve to
// nothing, values that violate a documented format). Programmer-error
// invariant violations — pitches above 127, zero-duration decomposition,
// invalid time signatures — panic instead; they indicate a defect in an
// upstream component, not a runtime condition to handle.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to overwrite existing file '{0}'")]
    FileExists(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("{path}: malformed matrix csv: {reason}")]
    Csv { path: PathBuf, reason: String },

    #[error("{path}: unreadable score file: {reason}")]
    Score { path: PathBuf, reason: String },

    #[error("unknown {kind} algorithm '{name}'")]
    UnknownAlgorithm { kind: &'static str, name: String },

    #[error(transparent)]
    UnknownEngine(#[from] cantus_prng::UnknownEngine),

    #[error("invalid scale mask '{0}': expected 12 characters of '0'/'1'")]
    InvalidScaleMask(String),

    #[error("accompaniment schematic has length {0}, expected a power of two")]
    SchematicLength(usize),

    #[error("schematic letter '{0}' out of range: only A, B and C are allowed")]
    SchematicLetter(char),

    #[error("no notation name for duration {duration} at {divisions} divisions")]
    UnknownDuration { duration: u32, divisions: u32 },

    #[error("chord root '{0}' cannot be found in the playable range")]
    ChordOutOfRange(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
