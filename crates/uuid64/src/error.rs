//! Error types for the compact identifier codec.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure of the codec, the node registry, and the durable
//! store behind it.
//!
//! ## Error Cases
//! - `InvalidVersion`: encode was handed a non-version-1 identifier.
//! - `InvalidTimestamp`: the identifier predates the codec epoch.
//! - `NodeSpaceExhausted`: a node id no longer fits in three encoded bytes.
//! - `AllocationExhausted`: the bucket-probe sequence was spent without
//!   finding a free or matching slot.
//! - `UnknownNode`: decode referenced a node id with no registry binding.
//! - `MalformedCode`: decode input is not a well-formed compact code.
//! - `Store`: the durable store itself failed.

use crate::{NodeId, NodeValue};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the codec, registry, and durable store.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Only version-1, time-based identifiers can be encoded.
    #[error("cannot encode a version-{version} identifier (only version 1 is supported)")]
    InvalidVersion { version: u8 },

    /// The identifier's timestamp is older than the codec epoch and cannot
    /// be re-based.
    #[error("timestamp {ticks:#x} predates the codec epoch")]
    InvalidTimestamp { ticks: u64 },

    /// The registry returned a node id too large to pack: three encoded
    /// bytes hold 22 id bits after the width tag.
    #[error("node id {id} does not fit in three encoded bytes")]
    NodeSpaceExhausted { id: NodeId },

    /// Every candidate bucket was occupied by a different node value.
    #[error("no free bucket for node {value} after {probes} probes")]
    AllocationExhausted { value: NodeValue, probes: usize },

    /// The decoded node id has no binding in the registry.
    #[error("node id {id} is not registered")]
    UnknownNode { id: NodeId },

    /// The input is not valid base64, or unpacks inconsistently.
    #[error("malformed code: {reason}")]
    MalformedCode { reason: String },

    /// The durable store failed while reading or writing a binding.
    #[error("node store error")]
    Store(#[source] Box<dyn core::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCode {
            reason: reason.into(),
        }
    }
}
