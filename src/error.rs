//! Error types for the enumeration-context engine.

use crate::enumeration::ContextId;
use crate::value::ValueKind;
use thiserror::Error;

/// Value construction errors.
///
/// Every variant is a flavor of the protocol's `InvalidValue` failure: the value
/// is rejected before any state is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidValue {
    #[error("Heterogeneous array: expected {expected} elements, found {found} at index {index}")]
    HeterogeneousArray {
        expected: ValueKind,
        found: ValueKind,
        index: usize,
    },

    #[error("Arrays cannot contain arrays")]
    NestedArray,

    #[error("Arrays cannot contain null elements (index {index})")]
    NullArrayElement { index: usize },

    #[error("Cannot infer the element kind of an empty array")]
    UntypedEmptyArray,

    #[error("Integer {value} out of range for {kind}")]
    IntegerOutOfRange { kind: ValueKind, value: i128 },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid language tag: {0:?}")]
    InvalidLanguageTag(String),

    #[error("Duplicate language tag: {0}")]
    DuplicateLanguageTag(String),

    #[error("Invalid property name: {0:?}")]
    InvalidPropertyName(String),

    #[error("Duplicate property: {0}")]
    DuplicateProperty(String),

    #[error("Malformed value node: {0}")]
    MalformedNode(String),
}

/// Errors returned by Open/Pull/Close and the registry behind them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerationError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid max object count {requested} (limit {limit})")]
    InvalidMaxCount { requested: u32, limit: u32 },

    #[error("Invalid operation timeout {requested}s (allowed 1..={limit}s)")]
    InvalidOperationTimeout { requested: u32, limit: u32 },

    #[error("Too many open enumeration contexts (limit {limit})")]
    TooManyContexts { limit: usize },

    #[error("Enumeration context not found: {0}")]
    ContextNotFound(ContextId),

    #[error("A pull is already in progress on enumeration context {0}")]
    ConcurrentPullNotAllowed(ContextId),

    #[error("Server limits exceeded: {0}")]
    ServerLimitsExceeded(String),

    #[error("Invalid value: {0}")]
    InvalidValue(#[from] InvalidValue),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for EnumerationError {
    fn from(err: config::ConfigError) -> Self {
        EnumerationError::ConfigError(err.to_string())
    }
}

/// Result buffer mutation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Result buffer is closed")]
    BufferClosed,
}

/// Errors seen by a provider pushing into its sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Enumeration was cancelled")]
    Cancelled,

    #[error("Result buffer is closed")]
    BufferClosed,
}

impl From<BufferError> for SinkError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::BufferClosed => SinkError::BufferClosed,
        }
    }
}
