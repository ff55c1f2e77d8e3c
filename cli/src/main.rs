//! ethwire CLI: query an Ethereum node from the terminal.
//!
//! Usage:
//! ```bash
//! # Check an endpoint
//! ethwire test --url https://cloudflare-eth.com
//!
//! # Send a raw JSON-RPC call
//! ethwire call --url ws://127.0.0.1:8546 --method eth_getBalance \
//!     --params '["0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d", "latest"]'
//!
//! # Read a contract
//! ethwire read --url /var/run/geth.ipc --to 0x547a…f5e6 --fn balanceOf \
//!     --inputs address --outputs uint256 --args 0x18c2…849d
//!
//! # Stream new heads
//! ethwire subscribe --url ws://127.0.0.1:8546 --kind newHeads --count 3
//! ```

mod logging;

use std::env;
use std::fs;
use std::process;
use std::time::Instant;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;
use anyhow::{bail, Context};
use ethwire_core::ClientConfig;
use ethwire_eth::abi::{self, MethodCall};
use ethwire_eth::{BlockParameter, EthClient};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use logging::LogConfig;

/// Contents of the `--config` file: client settings plus a `log` section.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(flatten)]
    client: ClientConfig,
    #[serde(default)]
    log: LogConfig,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];
    match command {
        "version" | "--version" | "-V" => {
            println!("ethwire {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        _ => {}
    }

    let config = match load_config(rest) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };
    logging::init_tracing(&config.log);

    let result = match command {
        "test" => cmd_test(&config.client).await,
        "call" => cmd_call(&config.client, rest).await,
        "block-number" => cmd_block_number(&config.client).await,
        "read" => cmd_read(&config.client, rest).await,
        "subscribe" => cmd_subscribe(&config.client, rest).await,
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("ethwire {}", env!("CARGO_PKG_VERSION"));
    println!("Query Ethereum nodes over HTTP, WebSocket or IPC\n");
    println!("USAGE:");
    println!("    ethwire <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    test          Check an endpoint (latency, chain id, head)");
    println!("    call          Send a raw JSON-RPC call");
    println!("    block-number  Print the latest block number");
    println!("    read          Call a contract function and decode the result");
    println!("    subscribe     Stream eth_subscribe notifications as JSON lines");
    println!("    version       Print version");
    println!("    help          Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>          http(s)://, ws(s):// or an IPC socket path");
    println!("    --config <FILE>      JSON file with client settings and a \"log\" section");
    println!("    --timeout-ms <MS>    Per-request timeout");
    println!("    --log-level <LEVEL>  trace | debug | info | warn | error");
    println!("    --log-json           Structured JSON logs on stderr\n");
    println!("CALL:       --method <NAME> [--params <JSON ARRAY>]");
    println!("READ:       --to <ADDR> --fn <NAME> [--inputs t1,t2] [--outputs t1,t2] [--args a1,a2] [--block <TAG|N>]");
    println!("SUBSCRIBE:  [--kind newHeads|logs|newPendingTransactions|syncing] [--address <ADDR>] [--count <N>]");
}

fn load_config(args: &[String]) -> anyhow::Result<CliConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => CliConfig::default(),
    };

    if let Some(url) = parse_flag(args, "--url") {
        config.client.endpoint_url = url;
    }
    if let Some(ms) = parse_flag(args, "--timeout-ms") {
        config.client.request_timeout_default_ms =
            ms.parse().with_context(|| format!("--timeout-ms {ms:?}"))?;
    }
    if let Some(level) = parse_flag(args, "--log-level") {
        config.log.level = level;
    }
    if has_flag(args, "--log-json") {
        config.log.json = true;
    }
    if config.client.endpoint_url.is_empty() {
        bail!("--url is required (or endpoint_url in --config)");
    }
    Ok(config)
}

async fn connect(config: &ClientConfig) -> anyhow::Result<EthClient> {
    EthClient::connect_with(config.clone())
        .await
        .with_context(|| format!("connecting to {}", config.endpoint_url))
}

async fn cmd_test(config: &ClientConfig) -> anyhow::Result<()> {
    println!("Testing {}...", config.endpoint_url);
    let eth = connect(config).await?;

    let start = Instant::now();
    let block = eth.block_number().await?;
    let latency = start.elapsed();
    let chain_id = eth.chain_id().await?;
    let version = eth.client_version().await.unwrap_or_else(|e| format!("unavailable ({e})"));

    println!("  Status:       OK");
    println!("  Transport:    {}", eth.rpc().transport_kind());
    println!("  Client:       {version}");
    println!("  Chain id:     {chain_id}");
    println!("  Block number: {block}");
    println!("  Latency:      {}ms", latency.as_millis());

    eth.close().await;
    Ok(())
}

async fn cmd_call(config: &ClientConfig, args: &[String]) -> anyhow::Result<()> {
    let method = parse_flag(args, "--method").context("--method is required")?;
    let params: Vec<Value> = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON array")?,
        None => vec![],
    };

    let eth = connect(config).await?;
    let result = eth.request(&method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    eth.close().await;
    Ok(())
}

async fn cmd_block_number(config: &ClientConfig) -> anyhow::Result<()> {
    let eth = connect(config).await?;
    println!("{}", eth.block_number().await?);
    eth.close().await;
    Ok(())
}

async fn cmd_read(config: &ClientConfig, args: &[String]) -> anyhow::Result<()> {
    let to: Address = parse_flag(args, "--to")
        .context("--to is required")?
        .parse()
        .context("--to is not an address")?;
    let name = parse_flag(args, "--fn").context("--fn is required")?;
    let inputs = split_list(parse_flag(args, "--inputs").as_deref());
    let outputs = split_list(parse_flag(args, "--outputs").as_deref());
    let raw_args = split_list(parse_flag(args, "--args").as_deref());
    let block: BlockParameter = match parse_flag(args, "--block") {
        Some(b) => b.parse().with_context(|| format!("--block {b:?}"))?,
        None => BlockParameter::Latest,
    };

    let method = MethodCall::parse(&name, &inputs, &outputs)?.bind(to);
    let values = abi::coerce(&method.input_types, &raw_args)?;
    tracing::debug!(signature = %method.signature(), %to, %block, "reading contract");

    let eth = connect(config).await?;
    let decoded = eth.call_method(&method, &values, block).await?;
    for value in &decoded {
        println!("{}", render(value));
    }
    eth.close().await;
    Ok(())
}

async fn cmd_subscribe(config: &ClientConfig, args: &[String]) -> anyhow::Result<()> {
    let kind = parse_flag(args, "--kind").unwrap_or_else(|| "newHeads".to_string());
    let count: Option<usize> = parse_flag(args, "--count")
        .map(|c| c.parse())
        .transpose()
        .context("--count must be a number")?;
    let mut params = vec![json!(kind)];
    if let Some(address) = parse_flag(args, "--address") {
        params.push(json!({ "address": address }));
    }

    let eth = connect(config).await?;
    let mut sub = eth.rpc().subscribe("eth_subscribe", params).await?;
    eprintln!("subscribed to {kind} as {}", sub.id());

    let mut received = 0usize;
    loop {
        tokio::select! {
            item = sub.next() => match item {
                Some(Ok(payload)) => {
                    println!("{payload}");
                    received += 1;
                    if count.is_some_and(|c| received >= c) {
                        break;
                    }
                }
                Some(Err(lost)) => return Err(lost.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Err(e) = sub.unsubscribe().await {
        tracing::warn!(error = %e, "unsubscribe failed");
    }
    eth.close().await;
    Ok(())
}

/// Human-readable rendering of a decoded ABI value.
fn render(value: &DynSolValue) -> String {
    let list = |items: &[DynSolValue]| items.iter().map(render).collect::<Vec<_>>().join(", ");
    match value {
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Uint(n, _) => n.to_string(),
        DynSolValue::Int(n, _) => n.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format!("[{}]", list(items)),
        DynSolValue::Tuple(items) => format!("({})", list(items)),
        other => format!("{other:?}"),
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
