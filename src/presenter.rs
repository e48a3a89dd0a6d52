use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::discord::Message;
use crate::storage::UptimeWindow;
use crate::{HostIdentity, ProbeOutcome};

/// Identifier of a posted artifact, used to edit it in place later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(pub String);

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArtifactHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug)]
pub enum PresentationError {
    /// The request never got a response
    Http(reqwest::Error),

    /// The API answered with an unexpected status
    Status { status: u16, body: String },

    /// The response body could not be understood
    Decode(String),

    /// The adapter cannot ever become ready (bad token, unknown channel)
    Fatal(String),
}

impl fmt::Display for PresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationError::Http(err) => write!(f, "request failed: {err}"),
            PresentationError::Status { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
            PresentationError::Decode(reason) => write!(f, "invalid response: {reason}"),
            PresentationError::Fatal(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for PresentationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PresentationError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PresentationError {
    fn from(err: reqwest::Error) -> Self {
        PresentationError::Http(err)
    }
}

/// Where rendered host status ends up.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Resolve once the adapter can post. Transient failures are retried;
    /// an error means it never will be ready.
    async fn wait_until_ready(&self) -> Result<(), PresentationError>;

    fn render_snapshot(
        &self,
        identity: &HostIdentity,
        outcome: &ProbeOutcome,
        window: &UptimeWindow,
    ) -> Message;

    /// Edit `prior` in place, or post a new artifact when there is none or it
    /// no longer exists.
    async fn post_or_update(
        &self,
        message: &Message,
        prior: Option<&ArtifactHandle>,
    ) -> Result<ArtifactHandle, PresentationError>;
}
