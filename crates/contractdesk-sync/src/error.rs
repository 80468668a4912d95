use contractdesk_model::PayloadError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Boxed collaborator failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures surfaced by the sync layer.
///
/// Unresolved sheet-group references and unknown units are not errors; they degrade
/// to "leave the field alone".
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed input: {0}")]
    MalformedInput(#[from] PayloadError),
    #[error("{what} lookup failed: {source}")]
    Lookup {
        what: &'static str,
        #[source]
        source: BoxError,
    },
}

impl SyncError {
    pub(crate) fn lookup(what: &'static str, source: impl Into<BoxError>) -> Self {
        SyncError::Lookup {
            what,
            source: source.into(),
        }
    }
}
