//! Integration tests for the enumeration-context engine

mod concurrency;
mod config_integration;
mod faults;
mod pull_sequence;
mod reaper;
mod values;
