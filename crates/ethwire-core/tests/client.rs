//! End-to-end behaviour of `RpcClient` over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use ethwire_core::memory::{MemoryServer, MemoryTransport};
use ethwire_core::quantity;
use ethwire_core::{
    ClientConfig, ClientError, ConnectionLost, ConnectionState, RpcClient, Transport,
};
use futures::StreamExt;
use serde_json::{json, Value};

async fn duplex_client(config: ClientConfig) -> (RpcClient, MemoryServer) {
    let (transport, server) = MemoryTransport::duplex();
    let client = RpcClient::connect(Arc::new(transport), config).await.unwrap();
    (client, server)
}

/// Answer the next subscribe request with `id` and return its params.
async fn accept_subscription(server: &mut MemoryServer, id: &str) -> Vec<Value> {
    let req = server.next_request().await.unwrap();
    assert_eq!(req.method, "eth_subscribe");
    server.respond(req.id, json!(id));
    req.params
}

#[tokio::test]
async fn block_number_round_trip() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_blockNumber", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    assert_eq!(req.method, "eth_blockNumber");
    assert!(req.params.is_empty());
    server.respond(req.id, json!("0x10"));

    let value = call.await.unwrap().unwrap();
    assert_eq!(value, json!("0x10"));
    assert_eq!(quantity::parse_u64(value.as_str().unwrap()).unwrap(), 16);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn concurrent_calls_pair_with_out_of_order_responses() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;

    let calls: Vec<_> = ["eth_chainId", "eth_gasPrice", "net_version"]
        .into_iter()
        .map(|method| {
            let client = client.clone();
            tokio::spawn(async move { client.call(method, vec![]).await })
        })
        .collect();

    let mut reqs = Vec::new();
    for _ in 0..3 {
        reqs.push(server.next_request().await.unwrap());
    }
    for req in reqs.iter().rev() {
        server.respond(req.id, json!(format!("answer:{}", req.method)));
    }

    let answers: Vec<Value> = futures::future::join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    assert_eq!(
        answers,
        vec![
            json!("answer:eth_chainId"),
            json!("answer:eth_gasPrice"),
            json!("answer:net_version"),
        ]
    );
}

#[tokio::test]
async fn call_as_decodes_or_reports_decode_error() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;

    let typed = tokio::spawn({
        let client = client.clone();
        async move { client.call_as::<Vec<String>>("eth_accounts", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond(req.id, json!(["0x407d73d8a49eeb85d32cf465507dd71d507100c1"]));
    assert_eq!(typed.await.unwrap().unwrap().len(), 1);

    let wrong = tokio::spawn({
        let client = client.clone();
        async move { client.call_as::<u64>("eth_accounts", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond(req.id, json!(["not a number"]));
    assert!(matches!(wrong.await.unwrap().unwrap_err(), ClientError::Decode(_)));
}

#[tokio::test]
async fn rpc_error_reaches_the_caller() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_foo", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond_error(req.id, -32601, "the method eth_foo does not exist");

    match call.await.unwrap().unwrap_err() {
        ClientError::Rpc(e) => {
            assert_eq!(e.code, -32601);
            assert!(e.message.contains("eth_foo"));
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_then_late_response_is_ignored() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let err = client
        .call_with_timeout("eth_syncing", vec![], Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(client.pending_requests(), 0);

    let stale = server.next_request().await.unwrap();
    server.respond(stale.id, json!(false));

    // The connection keeps working after the stale response.
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_syncing", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond(req.id, json!(false));
    assert_eq!(call.await.unwrap().unwrap(), json!(false));
}

#[tokio::test]
async fn garbage_frames_do_not_break_the_connection() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_chainId", vec![]).await }
    });
    let req = server.next_request().await.unwrap();

    server.push("this is not json");
    server.push(r#"{"jsonrpc":"2.0","id":1,"method":"eth_subscription","params":{}}"#);
    server.push(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"parse error"}}"#);
    server.respond(req.id, json!("0x1"));

    assert_eq!(call.await.unwrap().unwrap(), json!("0x1"));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn malformed_response_fails_only_its_caller() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_chainId", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.push_json(&json!({ "jsonrpc": "2.0", "id": req.id }));

    assert!(matches!(call.await.unwrap().unwrap_err(), ClientError::Protocol(_)));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn subscription_yields_notifications_in_order() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let sub = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe("eth_subscribe", vec![json!("newHeads")]).await }
    });

    let params = accept_subscription(&mut server, "0x9cef478923ff08bf67fde6c64013158d").await;
    assert_eq!(params, vec![json!("newHeads")]);
    // Sent right behind the response: must not be lost.
    server.notify("0x9cef478923ff08bf67fde6c64013158d", json!({ "number": "0x1b4" }));
    server.notify("0x9cef478923ff08bf67fde6c64013158d", json!({ "number": "0x1b5" }));

    let mut sub = sub.await.unwrap().unwrap();
    assert_eq!(sub.id().as_str(), "0x9cef478923ff08bf67fde6c64013158d");
    assert_eq!(sub.next().await.unwrap().unwrap()["number"], "0x1b4");
    assert_eq!(sub.next().await.unwrap().unwrap()["number"], "0x1b5");

    let nothing = tokio::time::timeout(Duration::from_millis(30), sub.next()).await;
    assert!(nothing.is_err(), "stream should stay pending");
    assert_eq!(client.subscription_count(), 1);
}

#[tokio::test]
async fn notifications_for_unknown_subscriptions_are_dropped() {
    let (client, server) = duplex_client(ClientConfig::default()).await;
    server.notify("0xdead", json!({}));
    tokio::task::yield_now().await;
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unsubscribe_twice_is_benign() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let sub = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe("eth_subscribe", vec![json!("newPendingTransactions")]).await }
    });
    accept_subscription(&mut server, "0xabc").await;
    let mut sub = sub.await.unwrap().unwrap();

    let first = tokio::spawn(async move {
        let first = sub.unsubscribe().await;
        (sub, first)
    });
    let req = server.next_request().await.unwrap();
    assert_eq!(req.method, "eth_unsubscribe");
    assert_eq!(req.params, vec![json!("0xabc")]);
    server.respond(req.id, json!(true));

    let (mut sub, first) = first.await.unwrap();
    assert!(first.unwrap());
    assert!(!sub.unsubscribe().await.unwrap());
    assert!(sub.next().await.is_none());
    assert_eq!(client.subscription_count(), 0);

    // Late notification for the removed id is dropped quietly.
    server.notify("0xabc", json!("0x1"));
    tokio::task::yield_now().await;
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unsubscribe_releases_a_full_channel() {
    let config = ClientConfig::default().with_notification_channel_capacity(1);
    let (client, mut server) = duplex_client(config).await;
    let sub = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe("eth_subscribe", vec![json!("newHeads")]).await }
    });
    accept_subscription(&mut server, "0x1").await;
    let mut sub = sub.await.unwrap().unwrap();

    // One buffered, one blocking the read loop.
    server.notify("0x1", json!(1));
    server.notify("0x1", json!(2));

    let unsub = tokio::spawn(async move { sub.unsubscribe().await });
    let req = server.next_request().await.unwrap();
    assert_eq!(req.method, "eth_unsubscribe");
    server.respond(req.id, json!(true));
    assert!(unsub.await.unwrap().unwrap());
}

#[tokio::test]
async fn connection_loss_fails_calls_and_ends_subscriptions() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let mut states = client.state_changes();

    let mut subs = Vec::new();
    for id in ["0xa", "0xb"] {
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.subscribe("eth_subscribe", vec![json!("newHeads")]).await }
        });
        accept_subscription(&mut server, id).await;
        subs.push(pending.await.unwrap().unwrap());
    }
    server.notify("0xa", json!("buffered"));

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call("eth_blockNumber", vec![]).await })
        })
        .collect();
    for _ in 0..3 {
        server.next_request().await.unwrap();
    }

    server.disconnect();

    for call in calls {
        assert!(call.await.unwrap().unwrap_err().is_connection_error());
    }
    let mut a = subs.remove(0);
    assert_eq!(a.next().await.unwrap().unwrap(), json!("buffered"));
    assert!(matches!(a.next().await.unwrap(), Err(ConnectionLost(_))));
    assert!(a.next().await.is_none());
    let mut b = subs.remove(0);
    assert!(matches!(b.next().await.unwrap(), Err(ConnectionLost(_))));

    while *states.borrow_and_update() != ConnectionState::Disconnected {
        states.changed().await.unwrap();
    }
    assert_eq!(client.subscription_count(), 0);
    assert!(client.call("eth_blockNumber", vec![]).await.unwrap_err().is_connection_error());
    assert!(!a.unsubscribe().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callers_failed_by_connection_loss_see_disconnected_state() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe("eth_subscribe", vec![json!("newHeads")]).await }
    });
    accept_subscription(&mut server, "0xa").await;
    let mut sub = pending.await.unwrap().unwrap();

    let call = tokio::spawn({
        let client = client.clone();
        async move {
            let err = client.call("eth_blockNumber", vec![]).await.unwrap_err();
            (err, client.state())
        }
    });
    server.next_request().await.unwrap();
    server.disconnect();

    let (err, state) = call.await.unwrap();
    assert!(err.is_connection_error());
    assert_eq!(state, ConnectionState::Disconnected);

    assert!(matches!(sub.next().await.unwrap(), Err(ConnectionLost(_))));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnect_makes_one_attempt() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    server.disconnect();
    let mut states = client.state_changes();
    while *states.borrow_and_update() != ConnectionState::Disconnected {
        states.changed().await.unwrap();
    }

    server.refuse_connections(true);
    assert!(client.reconnect().await.unwrap_err().is_connection_error());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    server.refuse_connections(false);
    client.reconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(server.connect_count(), 2);

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_chainId", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond(req.id, json!("0x1"));
    assert_eq!(call.await.unwrap().unwrap(), json!("0x1"));
}

#[tokio::test]
async fn close_is_terminal() {
    let (client, mut server) = duplex_client(ClientConfig::default()).await;
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("eth_getLogs", vec![json!({})]).await }
    });
    server.next_request().await.unwrap();

    client.close().await;
    assert!(call.await.unwrap().unwrap_err().is_connection_error());
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!server.is_connected());

    assert!(client.call("eth_chainId", vec![]).await.is_err());
    assert!(client.reconnect().await.is_err());
    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn unary_transport_rejects_subscriptions() {
    let (transport, mut server) = MemoryTransport::unary();
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let client = RpcClient::connect(transport, ClientConfig::default()).await.unwrap();

    let err = client.subscribe("eth_subscribe", vec![json!("newHeads")]).await.unwrap_err();
    assert!(matches!(err, ClientError::Unsupported(_)));

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("web3_clientVersion", vec![]).await }
    });
    let req = server.next_request().await.unwrap();
    server.respond(req.id, json!("Geth/v1.13.0"));
    assert_eq!(call.await.unwrap().unwrap(), json!("Geth/v1.13.0"));
}

#[tokio::test]
async fn connect_failure_leaves_client_unconstructed() {
    let (transport, server) = MemoryTransport::duplex();
    server.refuse_connections(true);
    let err = RpcClient::connect(Arc::new(transport), ClientConfig::default())
        .await
        .unwrap_err();
    assert!(err.is_connection_error());
}
