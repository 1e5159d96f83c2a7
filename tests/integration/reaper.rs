//! Idle expiry of enumeration contexts

use super::test_utils::*;
use cimpull::provider::StaticProvider;
use cimpull::{CloseOutcome, EnumerationError, OpenRequest, ProviderRegistry, PullRequest};
use std::time::Duration;

fn open_with_timeout(secs: u32) -> OpenRequest {
    OpenRequest {
        operation_timeout: Some(secs),
        ..open_request(1)
    }
}

#[tokio::test(start_paused = true)]
async fn test_expired_context_is_reaped() {
    let dispatcher = static_dispatcher(10);
    dispatcher.start();

    let id = dispatcher
        .open(&owner(), open_with_timeout(1))
        .await
        .unwrap()
        .context_id
        .unwrap();
    let context = dispatcher.registry().get(&id).unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(context.is_closed());
    assert_eq!(
        dispatcher
            .pull(&owner(), PullRequest::new(id.clone(), 1))
            .await
            .unwrap_err(),
        EnumerationError::ContextNotFound(id.clone())
    );
    assert_eq!(dispatcher.close(&owner(), &id).await, CloseOutcome::NotFound);
    assert_eq!(dispatcher.statistics().timed_out, 1);

    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_pulls_keep_context_alive() {
    let dispatcher = static_dispatcher(10);
    dispatcher.start();

    let id = dispatcher
        .open(&owner(), open_with_timeout(1))
        .await
        .unwrap()
        .context_id
        .unwrap();

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(800)).await;
        let response = dispatcher
            .pull(&owner(), PullRequest::new(id.clone(), 1))
            .await
            .unwrap();
        assert_eq!(response.items.len(), 1);
    }
    assert!(dispatcher.registry().get(&id).is_some());

    dispatcher.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reaper_skips_context_with_pull_in_flight() {
    let provider = StaticProvider::new(CLASS, numbered(3)).with_item_delay(Duration::from_secs(3600));
    let dispatcher = std::sync::Arc::new(create_dispatcher(ProviderRegistry::new().with(provider)));
    dispatcher.start();

    let id = dispatcher
        .open(&owner(), open_with_timeout(1))
        .await
        .unwrap()
        .context_id
        .unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    // Waits the full pull budget (500ms), straddling the deadline
    let pull = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 1))
        .await
        .unwrap();
    assert!(pull.items.is_empty());
    assert!(dispatcher.registry().get(&id).is_some(), "pull refreshed the deadline");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(dispatcher.registry().get(&id).is_none());

    dispatcher.shutdown().await;
}
