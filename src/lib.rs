//! cimpull: enumeration contexts for CIM/WBEM pull operations
//!
//! Lets clients of an object manager enumerate large, provider-generated result
//! sets in bounded batches: Open starts an enumeration and returns the first
//! batch, Pull returns the next ones, Close (or idle expiry) ends it. Providers
//! produce items concurrently into a bounded per-context buffer.

pub mod config;
pub mod dispatcher;
pub mod enumeration;
pub mod error;
pub mod logging;
pub mod provider;
pub mod server;
pub mod value;

pub use dispatcher::{
    CloseOutcome, EnumerationDispatcher, OpenRequest, OpenResponse, PullRequest, PullResponse,
};
pub use enumeration::{ContextId, OwnerId};
pub use error::EnumerationError;
pub use provider::{EnumerationProvider, Filter, ProviderFault, ProviderRegistry};
pub use server::ObjectManager;
pub use value::Value;
