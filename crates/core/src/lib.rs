//! Core types, traits, and error definitions for Perch.
//!
//! This crate provides the building blocks shared by every layer of the
//! identification pipeline: the data model, the wire codec, the response
//! repair utility, prompts, configuration, and the collaborator traits.

pub mod config;
pub mod error;
pub mod mocks;
pub mod prompts;
pub mod protocol;
pub mod repair;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
