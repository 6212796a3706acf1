use serde::{Deserialize, Serialize};

use super::{Candidate, EnrichedMedia, EnrichmentMetadata};

// =============================================================================
// Stream Chunks
// =============================================================================

/// One line of the identification stream.
///
/// Exactly one `Candidates` chunk precedes any `Media`/`Metadata` chunk, and
/// `Done` or `Error` is always last. `index` refers back to the position in
/// the candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Progress {
        message: String,
    },
    Candidates {
        data: Vec<Candidate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_content: Option<String>,
    },
    Media {
        index: usize,
        data: EnrichedMedia,
    },
    /// `data` is null when metadata could not be produced for that candidate.
    Metadata {
        index: usize,
        #[serde(default)]
        data: Option<EnrichmentMetadata>,
    },
    Heartbeat,
    Done {
        /// Elapsed milliseconds.
        duration: u64,
    },
    Error {
        message: String,
    },
}

impl StreamChunk {
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this chunk ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Wire tag, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Candidates { .. } => "candidates",
            Self::Media { .. } => "media",
            Self::Metadata { .. } => "metadata",
            Self::Heartbeat => "heartbeat",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
