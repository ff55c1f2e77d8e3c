//! `RpcClient` over `IpcTransport` against a Unix-socket node in a temp dir.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use ethwire_core::codec;
use ethwire_core::{ClientConfig, ConnectionLost, RpcClient};
use ethwire_ipc::IpcTransport;
use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

/// Serve one connection. A subscribe reply and its first notification go
/// out in a single write.
fn spawn_node(path: &Path) {
    let listener = UnixListener::bind(path).unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else { return };
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let req = codec::parse_request(line.as_bytes()).unwrap();
            let out = match req.method.as_str() {
                "eth_chainId" => format!("{}\n", json!({ "jsonrpc": "2.0", "id": req.id, "result": "0x1" })),
                "eth_subscribe" => format!(
                    "{}\n{}\n",
                    json!({ "jsonrpc": "2.0", "id": req.id, "result": "0x7" }),
                    json!({
                        "jsonrpc": "2.0",
                        "method": "eth_subscription",
                        "params": { "subscription": "0x7", "result": { "syncing": false } },
                    }),
                ),
                "test_hangUp" => return,
                _ => continue,
            };
            write.write_all(out.as_bytes()).await.unwrap();
        }
    });
}

#[tokio::test]
async fn calls_and_subscriptions_over_ipc() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geth.ipc");
    spawn_node(&path);

    let transport = Arc::new(IpcTransport::new(&path));
    let client = RpcClient::connect(transport, ClientConfig::default()).await.unwrap();

    assert_eq!(client.call("eth_chainId", vec![]).await.unwrap(), json!("0x1"));

    let mut syncing = client.subscribe("eth_subscribe", vec![json!("syncing")]).await.unwrap();
    assert_eq!(syncing.next().await.unwrap().unwrap(), json!({ "syncing": false }));

    let err = client.call("test_hangUp", vec![]).await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(matches!(syncing.next().await.unwrap(), Err(ConnectionLost(_))));
}
