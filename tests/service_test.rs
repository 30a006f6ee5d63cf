//! Integration tests for the request/response service pair

mod common;

use common::{PayloadService, TestMessage, TestService};
use bytes::Bytes;
use framelink::{NetConfig, NetError, ServiceClient, ServiceServer};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Give the spawned accept loop time to bind before the first call.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_calls_complete_in_order() {
    let port = 42101;
    let server = ServiceServer::<TestService>::new(port, NetConfig::new());
    server.advertise_service(|_peer, _request| TestMessage::response(1, 42));
    settle().await;

    let client = ServiceClient::<TestService>::new(NetConfig::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for _ in 0..5 {
        let tx = tx.clone();
        client.async_call(
            &TestMessage::request(2),
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            move |result| {
                let _ = tx.send(result);
            },
        );
    }

    for _ in 0..5 {
        let result = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("call did not complete")
            .unwrap();
        let response = result.expect("call failed");
        assert_eq!(response, TestMessage::response(1, 42));
    }

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_server_aborts_the_call_within_the_timeout() {
    let port = 42102;
    let server = ServiceServer::<TestService>::new(port, NetConfig::new());
    server.advertise_service(|_peer, request| {
        std::thread::sleep(Duration::from_millis(300));
        TestMessage::response(request.id, 0)
    });
    settle().await;

    let client = ServiceClient::<TestService>::new(NetConfig::new());
    let (tx, rx) = oneshot::channel();

    let started = Instant::now();
    client.async_call(
        &TestMessage::request(7),
        "127.0.0.1",
        port,
        Duration::from_millis(50),
        move |result| {
            let _ = tx.send(result);
        },
    );

    let result = timeout(Duration::from_secs(5), rx)
        .await
        .expect("handler never ran")
        .unwrap();
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(NetError::Aborted)));
    // Bounded by the timeout plus scheduling slack, well short of the
    // server's sleep.
    assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_and_re_advertise_serves_again() {
    let port = 42103;
    let server = ServiceServer::<TestService>::new(port, NetConfig::new());
    server.advertise_service(|_peer, request| TestMessage::response(request.id, 1));
    settle().await;

    let client = ServiceClient::<TestService>::new(NetConfig::new());

    let (tx, rx) = oneshot::channel();
    client.async_call(
        &TestMessage::request(42),
        "127.0.0.1",
        port,
        Duration::from_secs(1),
        move |result| {
            let _ = tx.send(result);
        },
    );
    let first = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(first.unwrap(), TestMessage::response(42, 1));

    server.cancel();
    settle().await;

    server.advertise_service(|_peer, request| TestMessage::response(request.id, 1));
    settle().await;

    let (tx, rx) = oneshot::channel();
    client.async_call(
        &TestMessage::request(43),
        "127.0.0.1",
        port,
        Duration::from_secs(1),
        move |result| {
            let _ = tx.send(result);
        },
    );
    let second = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(second.unwrap(), TestMessage::response(43, 1));

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversized_request_is_dropped_by_the_server() {
    let port = 42104;
    let server =
        ServiceServer::<PayloadService>::new(port, NetConfig::new().max_message_size(100));
    server.advertise_service(|_peer, request| request);
    settle().await;

    // Client-side cap is large enough to let the oversized request out.
    let client =
        ServiceClient::<PayloadService>::new(NetConfig::new().max_message_size(4096));
    let (tx, rx) = oneshot::channel();

    client.async_call(
        &Bytes::from(vec![0xABu8; 200]),
        "127.0.0.1",
        port,
        Duration::from_secs(2),
        move |result| {
            let _ = tx.send(result);
        },
    );

    let result = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    match result {
        Err(NetError::FailedOperation(_)) | Err(NetError::Aborted) => {}
        other => panic!("expected a dropped connection, got {other:?}"),
    }

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn large_payload_round_trips_unchanged() {
    let port = 42105;
    let config = NetConfig::new().max_message_size(65536);
    let server = ServiceServer::<PayloadService>::new(port, config.clone());

    let (seen_tx, seen_rx) = oneshot::channel();
    let seen_tx = std::sync::Mutex::new(Some(seen_tx));
    server.advertise_service(move |_peer, request: Bytes| {
        if let Some(tx) = seen_tx.lock().unwrap().take() {
            let _ = tx.send(request.clone());
        }
        request
    });
    settle().await;

    let payload = Bytes::from((0..65536u32).map(|i| i as u8).collect::<Vec<u8>>());

    let client = ServiceClient::<PayloadService>::new(config);
    let (tx, rx) = oneshot::channel();
    client.async_call(
        &payload,
        "127.0.0.1",
        port,
        Duration::from_secs(10),
        move |result| {
            let _ = tx.send(result);
        },
    );

    let response = timeout(Duration::from_secs(15), rx)
        .await
        .unwrap()
        .unwrap()
        .expect("large call failed");
    assert_eq!(response, payload);

    let at_server = timeout(Duration::from_secs(1), seen_rx).await.unwrap().unwrap();
    assert_eq!(at_server, payload);

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pre_resolved_endpoints_skip_the_resolve_stage() {
    let port = 42107;
    let server = ServiceServer::<TestService>::new(port, NetConfig::new());
    server.advertise_service(|_peer, request| TestMessage::response(request.id, 8));
    settle().await;

    // Resolve once up front, then call by endpoint list.
    let resolver = framelink::Resolver::new();
    let (resolved_tx, resolved_rx) = oneshot::channel();
    resolver.async_resolve("127.0.0.1", port, Duration::from_secs(5), move |result| {
        let _ = resolved_tx.send(result);
    });
    let endpoints = timeout(Duration::from_secs(5), resolved_rx)
        .await
        .unwrap()
        .unwrap()
        .expect("resolution failed");
    assert!(!endpoints.is_empty());

    let client = ServiceClient::<TestService>::new(NetConfig::new());
    let (tx, rx) = oneshot::channel();
    client.async_call_endpoints(
        &TestMessage::request(5),
        endpoints,
        Duration::from_secs(1),
        move |result| {
            let _ = tx.send(result);
        },
    );

    let response = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(response.unwrap(), TestMessage::response(5, 8));

    server.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_cancel_drops_queued_calls() {
    let port = 42106;
    let server = ServiceServer::<TestService>::new(port, NetConfig::new());
    server.advertise_service(|_peer, request| {
        std::thread::sleep(Duration::from_millis(100));
        TestMessage::response(request.id, 5)
    });
    settle().await;

    let client = ServiceClient::<TestService>::new(NetConfig::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    // First call occupies the manager; the second sits pending.
    for id in [1u32, 2] {
        let tx = tx.clone();
        client.async_call(
            &TestMessage::request(id),
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            move |result| {
                let _ = tx.send((id, result));
            },
        );
    }

    client.cancel();

    // The in-flight call surfaces Aborted; the queued call's handler never
    // runs.
    let (id, result) = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("in-flight handler never ran")
        .unwrap();
    assert_eq!(id, 1);
    assert!(matches!(result, Err(NetError::Aborted)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "queued handler must stay silent");

    server.cancel();
}
