//! Enumeration contexts
//!
//! Server-side state behind the Open/Pull/Close pull-operation sequence: the
//! result buffer shared between a provider task and client pulls, the context
//! that owns it, and the registry of live contexts with its reaper.

pub mod buffer;
pub mod cancel;
pub mod context;
pub mod registry;
pub mod stats;

pub use buffer::{DrainOutcome, ResultBuffer, ResultSink};
pub use cancel::CancelSignal;
pub use context::{ContextState, EnumerationContext};
pub use registry::ContextRegistry;
pub use stats::{ContextStatistics, RegistryStatistics};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque enumeration context identity handed to clients.
///
/// Built from a process-wide serial and 122 random bits, so identities are
/// never reused and cannot be guessed from another client's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    pub(crate) fn generate(serial: u64) -> Self {
        ContextId(format!("{:x}-{}", serial, uuid::Uuid::new_v4().simple()))
    }

    /// Wrap an identity received from a client
    pub fn from_client(id: impl Into<String>) -> Self {
        ContextId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the client session that opened a context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
