//! Property-based tests for ordering and value-model guarantees
