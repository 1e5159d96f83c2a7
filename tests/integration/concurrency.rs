//! Produce-while-consume under a multi-threaded runtime

use super::test_utils::*;
use cimpull::config::EnumerationConfig;
use cimpull::provider::ValueStream;
use cimpull::{Filter, OwnerId, ProviderFault, ProviderRegistry, PullRequest, Value};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

const ITEMS: u32 = 2_000;
const CAPACITY: usize = 16;

fn backpressured_dispatcher() -> Arc<cimpull::EnumerationDispatcher> {
    let provider = stream_provider(|_filter: &Filter| -> ValueStream {
        stream::iter(0..ITEMS)
            .then(|n| async move {
                if n % 100 == 0 {
                    tokio::task::yield_now().await;
                }
                Ok::<_, ProviderFault>(Value::uint32(n))
            })
            .boxed()
    });
    let config = EnumerationConfig {
        response_cache_capacity: CAPACITY,
        max_open_contexts: 64,
        pull_wait_ms: 2_000,
        ..test_config()
    };
    Arc::new(create_dispatcher_with_config(
        config,
        ProviderRegistry::new().with(provider),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_enumerations_deliver_everything_in_order() {
    let dispatcher = backpressured_dispatcher();

    let clients = (0..8u32).map(|client| {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let owner = OwnerId::new(format!("client-{}", client));
            let opened = dispatcher
                .open(&owner, open_request(client + 1))
                .await
                .unwrap();
            let mut items = opened.items;
            let id = opened.context_id.expect("capacity keeps the context open");

            let batch = 3 + client * 5;
            loop {
                let response = dispatcher
                    .pull(&owner, PullRequest::new(id.clone(), batch))
                    .await
                    .unwrap();
                assert!(response.items.len() <= batch as usize);
                items.extend(response.items);
                if response.end_of_sequence {
                    break;
                }
            }
            items
        })
    });

    for result in join_all(clients).await {
        let items = result.unwrap();
        let expected: Vec<Value> = (0..ITEMS).map(Value::uint32).collect();
        assert_eq!(items, expected);
    }

    let stats = dispatcher.statistics();
    assert_eq!(stats.opened, 8);
    assert_eq!(stats.closed, 8);
    assert!(dispatcher.registry().is_empty());
    assert!(
        stats.cache_high_water_mark <= CAPACITY,
        "provider must pause at the high watermark, saw {}",
        stats.cache_high_water_mark
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_races_with_producer() {
    let dispatcher = backpressured_dispatcher();

    for _ in 0..20 {
        let id = open_context(&dispatcher).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        let alice = owner();
        let (pulled, closed) = tokio::join!(
            dispatcher.pull(&alice, PullRequest::new(id.clone(), 7)),
            dispatcher.close(&alice, &id)
        );
        // Either the pull ran first, or the close removed the context
        match pulled {
            Ok(response) => assert!(response.items.len() <= 7),
            Err(err) => assert!(matches!(
                err,
                cimpull::EnumerationError::ContextNotFound(_)
                    | cimpull::EnumerationError::ConcurrentPullNotAllowed(_)
            )),
        }
        assert_eq!(closed, cimpull::CloseOutcome::Closed);
    }
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_of_sequence_is_reported_once() {
    let dispatcher = Arc::new(static_dispatcher(3));

    for _ in 0..50 {
        let id = open_context(&dispatcher).await;
        let pulls = (0..4).map(|_| {
            let dispatcher = dispatcher.clone();
            let id = id.clone();
            tokio::spawn(async move { dispatcher.pull(&owner(), PullRequest::new(id, 10)).await })
        });

        let mut delivered = 0;
        let mut finished = 0;
        for result in join_all(pulls).await {
            match result.unwrap() {
                Ok(response) => {
                    delivered += response.items.len();
                    if response.end_of_sequence {
                        finished += 1;
                    }
                }
                Err(err) => assert!(matches!(
                    err,
                    cimpull::EnumerationError::ContextNotFound(_)
                        | cimpull::EnumerationError::ConcurrentPullNotAllowed(_)
                )),
            }
        }
        if finished == 0 {
            delivered += pull_all(&dispatcher, &id, 10).await.unwrap().len();
            finished = 1;
        }

        assert_eq!(finished, 1);
        assert_eq!(delivered, 3);
        assert!(dispatcher.registry().get(&id).is_none());
    }
}
