//! Open/Pull sequences over well-behaved providers

use super::test_utils::*;
use cimpull::config::EnumerationConfig;
use cimpull::provider::StaticProvider;
use cimpull::{EnumerationError, ProviderRegistry, PullRequest, Value};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn test_open_pull_pull_example() {
    let dispatcher = static_dispatcher(5);

    let opened = dispatcher.open(&owner(), open_request(2)).await.unwrap();
    assert_eq!(opened.items, numbered(2));
    assert!(!opened.end_of_sequence);
    let id = opened.context_id.unwrap();

    let second = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 2))
        .await
        .unwrap();
    assert_eq!(second.items, vec![Value::uint32(2), Value::uint32(3)]);
    assert!(!second.end_of_sequence);
    assert!(second.items_available);

    let last = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 10))
        .await
        .unwrap();
    assert_eq!(last.items, vec![Value::uint32(4)]);
    assert!(last.end_of_sequence);
    assert!(last.fault.is_none());

    assert!(dispatcher.registry().is_empty());
    assert_eq!(
        dispatcher.pull(&owner(), PullRequest::new(id.clone(), 1)).await,
        Err(EnumerationError::ContextNotFound(id))
    );
}

#[tokio::test]
async fn test_pull_smaller_than_remainder_returns_exactly_n() {
    let dispatcher = static_dispatcher(21);
    let id = open_context(&dispatcher).await;

    for expected_start in [0u32, 7, 14] {
        let response = dispatcher
            .pull(&owner(), PullRequest::new(id.clone(), 6))
            .await
            .unwrap();
        let expected: Vec<Value> = (expected_start..expected_start + 6)
            .map(Value::uint32)
            .collect();
        assert_eq!(response.items, expected);
        assert!(!response.end_of_sequence);

        // Skip one item so batches do not line up with the provider
        let skip = dispatcher
            .pull(&owner(), PullRequest::new(id.clone(), 1))
            .await
            .unwrap();
        assert_eq!(skip.items.len(), 1);
    }
}

#[tokio::test]
async fn test_zero_count_pull_reports_availability_without_transfer() {
    let dispatcher = static_dispatcher(3);
    let id = open_context(&dispatcher).await;

    // Give the provider a chance to fill the buffer
    let first = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 1))
        .await
        .unwrap();
    assert_eq!(first.items.len(), 1);

    let probe = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 0))
        .await
        .unwrap();
    assert!(probe.items.is_empty());
    assert!(probe.items_available);
    assert!(!probe.end_of_sequence);

    let rest = pull_all(&dispatcher, &id, 10).await.unwrap();
    assert_eq!(rest, vec![Value::uint32(1), Value::uint32(2)]);
}

#[tokio::test]
async fn test_empty_enumeration_completes_on_open() {
    let dispatcher = static_dispatcher(0);
    let response = dispatcher.open(&owner(), open_request(5)).await.unwrap();
    assert!(response.items.is_empty());
    assert!(response.end_of_sequence);
    assert!(response.context_id.is_none());
    assert_eq!(dispatcher.statistics().opened, 1);
    assert_eq!(dispatcher.statistics().closed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pull_waits_for_slow_provider() {
    let provider = StaticProvider::new(CLASS, numbered(3)).with_item_delay(Duration::from_millis(80));
    let dispatcher = create_dispatcher(ProviderRegistry::new().with(provider));

    // Open gives up after its initial wait with whatever arrived
    let opened = dispatcher.open(&owner(), open_request(3)).await.unwrap();
    assert_eq!(opened.items, numbered(2));
    assert!(!opened.end_of_sequence);
    let id = opened.context_id.unwrap();

    let last = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 3))
        .await
        .unwrap();
    assert_eq!(last.items, vec![Value::uint32(2)]);
    assert!(last.end_of_sequence);
    assert!(dispatcher.registry().get(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pull_timeout_is_not_an_error() {
    let provider = StaticProvider::new(CLASS, numbered(2)).with_item_delay(Duration::from_secs(60));
    let dispatcher = create_dispatcher(ProviderRegistry::new().with(provider));
    let id = open_context(&dispatcher).await;

    let response = dispatcher
        .pull(
            &owner(),
            PullRequest::new(id.clone(), 5).with_wait(Duration::from_millis(50)),
        )
        .await
        .unwrap();
    assert!(response.items.is_empty());
    assert!(!response.end_of_sequence);
    assert!(!response.items_available);
    assert!(dispatcher.registry().get(&id).is_some());
}

#[tokio::test]
async fn test_max_count_above_limit_is_rejected_before_lookup() {
    let dispatcher = static_dispatcher(5);
    let id = open_context(&dispatcher).await;

    let err = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 1001))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EnumerationError::InvalidMaxCount {
            requested: 1001,
            limit: 1000
        }
    );

    // The context is untouched
    assert_eq!(pull_all(&dispatcher, &id, 100).await.unwrap(), numbered(5));
}

#[tokio::test]
async fn test_operation_timeout_bounds() {
    let dispatcher = static_dispatcher(5);

    let mut request = open_request(1);
    request.operation_timeout = Some(91);
    assert_eq!(
        dispatcher.open(&owner(), request).await.unwrap_err(),
        EnumerationError::InvalidOperationTimeout {
            requested: 91,
            limit: 90
        }
    );

    let mut request = open_request(1);
    request.operation_timeout = Some(90);
    let response = dispatcher.open(&owner(), request).await.unwrap();
    let id = response.context_id.unwrap();
    let context = dispatcher.registry().get(&id).unwrap();
    assert_eq!(context.operation_timeout(), Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn test_open_larger_than_capacity_returns_once_provider_pauses() {
    let config = EnumerationConfig {
        response_cache_capacity: 2,
        ..test_config()
    };
    let dispatcher = create_dispatcher_with_config(
        config,
        ProviderRegistry::new().with(StaticProvider::new(CLASS, numbered(100))),
    );

    let started = Instant::now();
    let opened = dispatcher.open(&owner(), open_request(10)).await.unwrap();
    assert_eq!(opened.items, numbered(2));
    assert!(!opened.end_of_sequence);
    assert!(
        started.elapsed() < Duration::from_millis(200),
        "open waited {:?} for a batch the buffer can never hold",
        started.elapsed()
    );
}
