//! Simultaneous deliveries answered by the same chaos address.

use std::sync::Arc;

use common::{DomainId, SubdomainId};
use domain::{ChaosAddress, Repository, SystemClock};
use event_store::InMemoryEventStore;
use handlers::{
    ChaosAddressHandler, CommandOutcome, CreateChaosAddress, HandlerContext, InMemoryPublisher,
};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

const DELIVERIES: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_concurrent_receive_is_counted() {
    let store = InMemoryEventStore::new();
    let context = HandlerContext::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(InMemoryPublisher::new()),
    );
    let handler = Arc::new(ChaosAddressHandler::new(context));
    let cancel = CancellationToken::new();

    let id = handler
        .create(
            CreateChaosAddress::new(DomainId::new(), SubdomainId::new(), "flaky", 421),
            &cancel,
        )
        .await
        .succeeded()
        .unwrap();
    assert!(handler.enable(id, &cancel).await.is_succeeded());

    let barrier = Arc::new(Barrier::new(DELIVERIES));
    let tasks: Vec<_> = (0..DELIVERIES)
        .map(|_| {
            let handler = Arc::clone(&handler);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                handler.record_receive(id).await
            })
        })
        .collect();

    let mut counts = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            CommandOutcome::Succeeded(count) => counts.push(count),
            other => panic!("receive was not recorded: {other:?}"),
        }
    }

    // Each writer saw a distinct count.
    counts.sort_unstable();
    assert_eq!(counts, (1..=DELIVERIES as u64).collect::<Vec<_>>());
    assert_eq!(
        store.events_of_type("ChaosAddressReceived").await.len(),
        DELIVERIES
    );

    let address = Repository::<_, ChaosAddress>::new(store).get(id).await.unwrap();
    assert_eq!(address.received_count(), DELIVERIES as u64);
}

#[tokio::test]
async fn receive_is_stored_after_the_request_was_cancelled() {
    let store = InMemoryEventStore::new();
    let context = HandlerContext::with_defaults(store.clone());
    let handler = ChaosAddressHandler::new(context);
    let cancel = CancellationToken::new();

    let id = handler
        .create(
            CreateChaosAddress::new(DomainId::new(), SubdomainId::new(), "flaky", 554),
            &cancel,
        )
        .await
        .succeeded()
        .unwrap();
    cancel.cancel();

    assert_eq!(handler.record_receive(id).await, CommandOutcome::Succeeded(1));
    assert_eq!(store.events_of_type("ChaosAddressReceived").await.len(), 1);
}
