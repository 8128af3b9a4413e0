use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the site capabilities and the collection loop.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("stale element handle: {0}")]
    StaleHandle(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("scrollable list container could not be located")]
    ContainerLost,

    #[error("interstitial page detected: {0}")]
    InterstitialDetected(String),

    #[error("session expired")]
    SessionExpired,

    #[error("item extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("re-authentication failed: {0}")]
    ReauthFailed(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse recovery class for a [`CollectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Stale handle or element not interactable; retried locally.
    TransientDom,
    /// The list region can no longer be found; escalating recovery.
    ContainerLost,
    /// Challenge or rate-limit wall; re-authenticate and back off.
    Interstitial,
    /// Logged out; full re-authentication.
    SessionExpired,
    /// One row could not be read; the row is skipped.
    Extraction,
    /// Nothing the loop can do about it.
    Fatal,
}

impl CollectError {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            CollectError::StaleHandle(_) | CollectError::NotInteractable(_) => {
                FailureClass::TransientDom
            }
            CollectError::ContainerLost => FailureClass::ContainerLost,
            CollectError::InterstitialDetected(_) => FailureClass::Interstitial,
            CollectError::SessionExpired => FailureClass::SessionExpired,
            CollectError::ExtractionFailed(_) => FailureClass::Extraction,
            CollectError::ReauthFailed(_) | CollectError::Browser(_) | CollectError::Store(_) => {
                FailureClass::Fatal
            }
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::TransientDom
    }
}

/// Errors from the on-disk checkpoint store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint for session {session_id} would shrink from {previous} to {attempted} records")]
    Regression {
        session_id: String,
        previous: usize,
        attempted: usize,
    },

    #[error("invalid path component {0:?}")]
    InvalidComponent(String),
}
