//! Browser capability interface.
//!
//! The mechanics of driving a real browser live outside the core; the
//! pipeline only sees these traits. Each operation reports its documented
//! failure modes explicitly, with `Unclassified` as the catch-all for
//! transient automation noise.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by driver operations.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// Navigation to a URL failed or timed out.
    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    /// The page shows an access-denied signature (403 block page).
    #[error("Access denied by the portal")]
    AccessDenied,

    /// A candidate handle went stale between listing and use.
    #[error("Stale element")]
    StaleElement,

    /// An expected element never appeared.
    #[error("Element not found: {selector}")]
    MissingElement { selector: String },

    /// The browser session itself failed (launch, window switch, teardown).
    #[error("Driver session error: {message}")]
    Session { message: String },

    /// Anything the driver could not classify.
    #[error("Unclassified driver error: {message}")]
    Unclassified { message: String, retryable: bool },
}

/// Opaque handle to one downloadable attachment candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateHandle(pub u64);

/// Launches one browser session per record attempt.
///
/// The session's downloads must land in the staging directory passed to
/// [`launch`](DriverFactory::launch); the directory outlives the session.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Session: DriverSession + Send;

    /// Start a fresh session downloading into `staging_dir`.
    async fn launch(&self, staging_dir: &Path) -> Result<Self::Session, DriverError>;
}

/// One live browser session, owned by a single record attempt.
#[async_trait]
pub trait DriverSession: Send {
    /// Open the record's detail view.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Open the secondary browsing context listing attachments and switch
    /// into it.
    async fn open_linked_context(&mut self, selector: &str) -> Result<(), DriverError>;

    /// List the attachment candidates visible in the current context.
    ///
    /// An empty list means the record genuinely has no attachments;
    /// a timeout waiting for the listing is `MissingElement`.
    async fn list_candidates(&mut self, selector: &str)
        -> Result<Vec<CandidateHandle>, DriverError>;

    /// Extract the human description of a candidate.
    async fn describe(&mut self, handle: CandidateHandle) -> Result<String, DriverError>;

    /// Click a candidate, starting its download.
    async fn click(&mut self, handle: CandidateHandle) -> Result<(), DriverError>;

    /// Whether the current page shows an access-denied signature.
    async fn is_access_denied(&mut self) -> Result<bool, DriverError>;

    /// Dismiss a native dialog if one is present.
    ///
    /// # Returns
    /// `true` if a dialog was present and dismissed.
    async fn dismiss_dialog_if_any(&mut self) -> Result<bool, DriverError>;

    /// Close the secondary context and return to the detail view.
    async fn close_linked_context(&mut self) -> Result<(), DriverError>;

    /// Tear the session down. Always called, regardless of outcome.
    async fn quit(&mut self) -> Result<(), DriverError>;
}

impl DriverError {
    /// Whether retrying the whole record attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriverError::Navigation { .. }
            | DriverError::AccessDenied
            | DriverError::Session { .. } => true,
            DriverError::StaleElement | DriverError::MissingElement { .. } => false,
            DriverError::Unclassified { retryable, .. } => *retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DriverError::AccessDenied.is_retryable());
        assert!(DriverError::Navigation {
            url: "https://x".into(),
            message: "timeout".into()
        }
        .is_retryable());
        assert!(!DriverError::StaleElement.is_retryable());
        assert!(DriverError::Unclassified {
            message: "flaky".into(),
            retryable: true
        }
        .is_retryable());
        assert!(!DriverError::Unclassified {
            message: "fatal".into(),
            retryable: false
        }
        .is_retryable());
    }
}
