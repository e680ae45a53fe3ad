use std::fmt;
use thiserror::Error;

/// Rejections from the mapping-management operations.
///
/// These are surfaced to whoever called the mutation and are never retried
/// by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingConflict {
    AlreadyExists,
    PendingDeletion,
    NotFound,
}

impl fmt::Display for MappingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingConflict::AlreadyExists => write!(f, "already exists"),
            MappingConflict::PendingDeletion => write!(
                f,
                "flagged for deletion but not yet removed, try again after the next sync"
            ),
            MappingConflict::NotFound => write!(f, "not found"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Source adapter error: {0}")]
    SourceAdapter(String),

    #[error("Sink adapter error: {0}")]
    SinkAdapter(String),

    #[error("Mapping conflict: {0}")]
    MappingConflict(MappingConflict),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    pub fn source_adapter<S: Into<String>>(msg: S) -> Self {
        Self::SourceAdapter(msg.into())
    }

    pub fn sink_adapter<S: Into<String>>(msg: S) -> Self {
        Self::SinkAdapter(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-friendly label, used as the `kind` in log lines.
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::SourceAdapter(_) => "source",
            Self::SinkAdapter(_) => "sink",
            Self::MappingConflict(_) => "mapping_conflict",
            Self::Persistence(_) => "persistence",
            Self::Config(_) => "config",
        }
    }

    /// Whether the next scheduled tick will try again on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Template(_) | Self::SourceAdapter(_) | Self::SinkAdapter(_) | Self::Persistence(_) => {
                true
            }
            Self::MappingConflict(_) | Self::Config(_) => false,
        }
    }

    pub fn conflict(&self) -> Option<MappingConflict> {
        match self {
            Self::MappingConflict(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<MappingConflict> for SyncError {
    fn from(conflict: MappingConflict) -> Self {
        Self::MappingConflict(conflict)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
