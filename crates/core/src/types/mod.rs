//! Core type definitions for Perch.
//!
//! Broken down into submodules by concern: the identification request, the
//! candidates it yields, the enrichment bundles attached to each candidate,
//! the species cache row, and the stream chunks that carry all of it.

pub mod cache;
pub mod candidate;
pub mod enrichment;
pub mod media;
pub mod request;
pub mod stream;

pub use cache::*;
pub use candidate::*;
pub use enrichment::*;
pub use media::*;
pub use request::*;
pub use stream::*;
