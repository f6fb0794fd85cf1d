//! Conversation events - what can move the request lifecycle forward.

use serde::{Deserialize, Serialize};

/// Events that drive `ChatStatus` transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A send or edit-branch action put a request on the wire.
    RequestSubmitted,

    /// The first assistant content chunk arrived.
    FirstChunkReceived,

    /// The stream finished naturally.
    StreamFinished,

    /// The stream was cancelled (user stop or stall timeout).
    StreamAborted,

    /// The transport or model capability failed mid-flight.
    StreamErrored,
}

impl std::fmt::Display for ConversationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RequestSubmitted => "request_submitted",
            Self::FirstChunkReceived => "first_chunk_received",
            Self::StreamFinished => "stream_finished",
            Self::StreamAborted => "stream_aborted",
            Self::StreamErrored => "stream_errored",
        };
        f.write_str(s)
    }
}
