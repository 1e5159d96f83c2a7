//! Provider faults and provider misbehavior

use super::test_utils::*;
use async_trait::async_trait;
use cimpull::enumeration::ResultSink;
use cimpull::provider::{StaticProvider, ValueStream};
use cimpull::{
    EnumerationError, EnumerationProvider, Filter, ProviderFault, ProviderRegistry, PullRequest,
    Value,
};
use futures::stream::{self, StreamExt};

fn faulting_dispatcher(items: u32, fail_after: usize) -> cimpull::EnumerationDispatcher {
    let provider = StaticProvider::new(CLASS, numbered(items))
        .fail_after(fail_after, ProviderFault::new(7, "access denied to /proc"));
    create_dispatcher(ProviderRegistry::new().with(provider))
}

#[tokio::test]
async fn test_fault_delivered_with_buffered_items() {
    let dispatcher = faulting_dispatcher(5, 3);
    let id = open_context(&dispatcher).await;

    let response = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 10))
        .await
        .unwrap();
    assert_eq!(response.items, numbered(3));
    assert!(response.end_of_sequence);
    assert_eq!(
        response.fault,
        Some(ProviderFault::new(7, "access denied to /proc"))
    );

    assert_eq!(
        dispatcher
            .pull(&owner(), PullRequest::new(id.clone(), 10))
            .await
            .unwrap_err(),
        EnumerationError::ContextNotFound(id)
    );
}

#[tokio::test]
async fn test_fault_waits_for_the_pull_that_empties_the_buffer() {
    let dispatcher = faulting_dispatcher(5, 3);
    let id = open_context(&dispatcher).await;

    let first = dispatcher
        .pull(&owner(), PullRequest::new(id.clone(), 2))
        .await
        .unwrap();
    assert_eq!(first.items, numbered(2));
    assert!(first.fault.is_none());
    assert!(!first.end_of_sequence);

    let second = dispatcher
        .pull(&owner(), PullRequest::new(id, 2))
        .await
        .unwrap();
    assert_eq!(second.items, vec![Value::uint32(2)]);
    assert!(second.end_of_sequence);
    assert_eq!(second.fault.map(|f| f.code), Some(7));
}

#[tokio::test]
async fn test_fault_within_open_window() {
    let dispatcher = faulting_dispatcher(5, 1);
    let response = dispatcher.open(&owner(), open_request(10)).await.unwrap();
    assert_eq!(response.items, numbered(1));
    assert!(response.end_of_sequence);
    assert!(response.context_id.is_none());
    assert_eq!(response.fault.map(|f| f.code), Some(7));
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn test_stream_provider_error_faults_enumeration() {
    let provider = stream_provider(|_filter: &Filter| -> ValueStream {
        stream::iter(vec![
            Ok(Value::string("eth0")),
            Ok(Value::string("eth1")),
            Err(ProviderFault::new(4, "interface table changed")),
            Ok(Value::string("never delivered")),
        ])
        .boxed()
    });
    let dispatcher = create_dispatcher(ProviderRegistry::new().with(provider));
    let id = open_context(&dispatcher).await;

    let response = dispatcher
        .pull(&owner(), PullRequest::new(id, 10))
        .await
        .unwrap();
    assert_eq!(
        response.items,
        vec![Value::string("eth0"), Value::string("eth1")]
    );
    assert_eq!(response.fault.map(|f| f.code), Some(4));
}

/// Completes, then keeps appending
struct LateAppender;

#[async_trait]
impl EnumerationProvider for LateAppender {
    fn class_name(&self) -> &str {
        CLASS
    }

    async fn enumerate(&self, _filter: &Filter, sink: &ResultSink) -> Result<(), ProviderFault> {
        sink.push(Value::uint32(0)).await?;
        sink.complete();
        sink.push(Value::uint32(1)).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_append_after_completion_is_reported_as_fault() {
    let dispatcher = create_dispatcher(ProviderRegistry::new().with(LateAppender));
    let id = open_context(&dispatcher).await;

    let response = dispatcher
        .pull(&owner(), PullRequest::new(id, 10))
        .await
        .unwrap();
    assert_eq!(response.items, numbered(1));
    assert!(response.end_of_sequence);
    assert!(response.fault.is_some());
}
