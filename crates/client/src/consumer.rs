//! Client-side reader for the identification stream.
//!
//! The consumer folds chunks into an [`IdentificationState`] and tells an
//! observer about every change. Faults are tolerated asymmetrically: before
//! the `candidates` chunk any interruption is a terminal error, afterwards it
//! is swallowed and the partial state is kept.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;

use perch_core::protocol::LineDecoder;
use perch_core::types::{Candidate, EnrichedMedia, EnrichmentMetadata, StreamChunk};

use crate::error::{ClientError, ClientResult};
use crate::result::{to_bird_result, BirdResult};

/// Receives progress from a [`StreamConsumer`].
pub trait StreamObserver: Send {
    fn on_update(&mut self, state: &IdentificationState);

    fn on_error(&mut self, error: &ClientError);
}

/// Everything received so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentificationState {
    pub progress: Option<String>,
    pub candidates: Vec<Candidate>,
    pub media: BTreeMap<usize, EnrichedMedia>,
    /// `None` values mark candidates whose metadata could not be produced.
    pub metadata: BTreeMap<usize, Option<EnrichmentMetadata>>,
    /// Server-reported duration in milliseconds, once `done` arrived.
    pub duration: Option<u64>,
    pub raw_content: Option<String>,
}

impl IdentificationState {
    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.duration.is_some()
    }

    /// Candidates merged with the enrichment received for each.
    pub fn results(&self) -> Vec<BirdResult> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                to_bird_result(candidate, self.media.get(&index))
                    .with_metadata(self.metadata.get(&index).cloned().flatten())
            })
            .collect()
    }
}

/// Incremental stream reader.
pub struct StreamConsumer<O: StreamObserver> {
    decoder: LineDecoder,
    state: IdentificationState,
    observer: O,
    /// Set by the `candidates` chunk, even when its list is empty.
    candidates_received: bool,
    failed: bool,
}

impl<O: StreamObserver> StreamConsumer<O> {
    pub fn new(observer: O) -> Self {
        Self {
            decoder: LineDecoder::new(),
            state: IdentificationState::default(),
            observer,
            candidates_received: false,
            failed: false,
        }
    }

    pub fn state(&self) -> &IdentificationState {
        &self.state
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Feed one byte segment from the transport.
    pub fn feed(&mut self, segment: &[u8]) -> ClientResult<()> {
        for chunk in self.decoder.push(segment) {
            self.apply(chunk)?;
        }
        Ok(())
    }

    /// Fold one chunk into the state. An `error` chunk before any candidate
    /// is terminal.
    pub fn apply(&mut self, chunk: StreamChunk) -> ClientResult<()> {
        if self.failed {
            return Ok(());
        }

        match chunk {
            StreamChunk::Progress { message } => self.state.progress = Some(message),
            StreamChunk::Heartbeat => return Ok(()),
            StreamChunk::Candidates { data, raw_content } => {
                self.state.candidates = data;
                self.state.raw_content = raw_content;
                self.candidates_received = true;
            }
            StreamChunk::Media { index, data } => {
                self.state.media.insert(index, data);
            }
            StreamChunk::Metadata { index, data } => {
                self.state.metadata.insert(index, data);
            }
            StreamChunk::Done { duration } => self.state.duration = Some(duration),
            StreamChunk::Error { message } => {
                return self.interrupt(ClientError::Stream(message));
            }
        }

        self.observer.on_update(&self.state);
        Ok(())
    }

    /// Report a transport fault.
    pub fn fail(&mut self, error: ClientError) -> ClientResult<()> {
        self.interrupt(error)
    }

    /// Flush the decoder at end of stream and return the final state.
    pub fn finish(mut self) -> ClientResult<IdentificationState> {
        if let Some(chunk) = self.decoder.finish() {
            self.apply(chunk)?;
        }
        if !self.candidates_received && !self.failed {
            self.interrupt(ClientError::Stream("Stream ended before any results".into()))?;
        }
        Ok(self.state)
    }

    /// Drain a byte stream to the end.
    pub async fn consume<S, E>(mut self, stream: S) -> ClientResult<IdentificationState>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        futures::pin_mut!(stream);
        while let Some(segment) = stream.next().await {
            match segment {
                Ok(bytes) => self.feed(&bytes)?,
                Err(e) => {
                    self.fail(ClientError::Transport(e.to_string()))?;
                    break;
                }
            }
        }
        self.finish()
    }

    fn interrupt(&mut self, error: ClientError) -> ClientResult<()> {
        if self.failed {
            return Ok(());
        }
        if self.candidates_received {
            tracing::debug!(error = %error, "Stream interrupted after candidates, keeping partial results");
            return Ok(());
        }
        self.failed = true;
        self.observer.on_error(&error);
        Err(error)
    }
}
