//! Per-request state machine.
//!
//! `Received → Classified → Fetching → {Fetched | FetchFailed}
//!  → {Sent | TooLarge | SendFailed} → Cleaned`
//!
//! Requests without a usable link go straight from `Received` to
//! `Cleaned`. Every path ends at `Cleaned`.

use std::fmt;
use tracing::debug;

/// Stage of one message-handling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    /// Message accepted by the handler
    Received,
    /// Link found and media kind decided
    Classified,
    /// Download in progress
    Fetching,
    /// File is on disk
    Fetched,
    /// Download failed (after the fallback, if any)
    FetchFailed,
    /// File uploaded to the chat
    Sent,
    /// File exceeded the upload ceiling and was discarded
    TooLarge,
    /// Upload rejected by the chat platform
    SendFailed,
    /// Temporary files removed, handler done
    Cleaned,
}

impl RequestStage {
    /// Whether `next` is a legal successor of `self`
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Classified | Self::Cleaned)
                | (Self::Classified, Self::Fetching)
                | (Self::Fetching, Self::Fetched | Self::FetchFailed)
                | (Self::Fetched, Self::Sent | Self::TooLarge | Self::SendFailed)
                | (
                    Self::FetchFailed | Self::Sent | Self::TooLarge | Self::SendFailed,
                    Self::Cleaned
                )
        )
    }

    /// Whether the handler is finished
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cleaned)
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::FetchFailed => "fetch_failed",
            Self::Sent => "sent",
            Self::TooLarge => "too_large",
            Self::SendFailed => "send_failed",
            Self::Cleaned => "cleaned",
        };
        f.write_str(label)
    }
}

/// Records the stages a request went through
#[derive(Debug, Clone)]
pub struct StageTrail {
    stages: Vec<RequestStage>,
}

impl Default for StageTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTrail {
    /// Start a trail at [`RequestStage::Received`]
    #[must_use]
    pub fn new() -> Self {
        debug!(stage = %RequestStage::Received, "Request stage");
        Self {
            stages: vec![RequestStage::Received],
        }
    }

    /// Current stage
    #[must_use]
    pub fn current(&self) -> RequestStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(RequestStage::Received)
    }

    /// Move to `next`.
    ///
    /// An illegal transition is a bug in the pipeline; it is logged and
    /// recorded anyway so the trail shows what happened.
    pub fn advance(&mut self, next: RequestStage) {
        let current = self.current();
        if current.can_advance_to(next) {
            debug!(from = %current, to = %next, "Request stage");
        } else {
            tracing::error!(from = %current, to = %next, "Illegal request stage transition");
        }
        self.stages.push(next);
    }

    /// All stages in order
    #[must_use]
    pub fn stages(&self) -> &[RequestStage] {
        &self.stages
    }

    /// Consume the trail
    #[must_use]
    pub fn into_stages(self) -> Vec<RequestStage> {
        self.stages
    }
}
