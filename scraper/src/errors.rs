use crate::imports::*;

/// Failure kinds of a run. Every kind is fatal; the scheduler is expected to retry the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Request to {url:?} failed")]
    TransportError {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected response from {url:?} (HTTP {status}): {detail}")]
    UnexpectedResponseShape { url: String, status: u16, detail: &'static str },
    #[error("Too many requests: the budget of {ceiling} attempts is exhausted")]
    RetryExceeded { ceiling: u32 },
    #[error("Malformed gate page: {0}")]
    MalformedGatePage(String),
    #[error("Line status response is not valid JSON")]
    DownstreamParseError(#[source] serde_json::Error),
    #[error("Failed to write line status file: {path:?}")]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which half of the run an error came from; used only to pick an exit code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Landing page load and the redirect chain in front of it.
    Page,
    /// Status query, JSON parsing and the cache file write.
    Status,
}

impl Phase {
    pub fn exit_code(self) -> i32 {
        match self {
            Phase::Page => 2,
            Phase::Status => 3,
        }
    }
}

impl ScrapeError {
    pub fn find(error: &anyhow::Error) -> Option<&ScrapeError> {
        error.chain().find_map(|cause| cause.downcast_ref::<ScrapeError>())
    }

    pub fn exit_code(&self, phase: Phase) -> i32 {
        match self {
            ScrapeError::UnexpectedResponseShape { .. }
            | ScrapeError::RetryExceeded { .. }
            | ScrapeError::MalformedGatePage(_) => Phase::Page.exit_code(),
            ScrapeError::DownstreamParseError(_) | ScrapeError::PersistenceError { .. } => Phase::Status.exit_code(),
            ScrapeError::TransportError { .. } => phase.exit_code(),
        }
    }
}

pub fn exit_code(error: &anyhow::Error, phase: Phase) -> i32 {
    ScrapeError::find(error).map_or_else(|| phase.exit_code(), |kind| kind.exit_code(phase))
}
