//! Thin client REPL over the gRPC surface, matching the CLI surface
//! fixed by spec.md §6: `put`, `get`, `check`, `get_all_data`, `add_node`,
//! `leave_node`. Entry routing is transparent — the client only needs the
//! address of any one live node.

use std::error::Error;
use std::io::{self, BufRead, Write};

use clap::Parser;
use tonic::Request;

use ringkeeper::chord_proto;
use ringkeeper::error::ChordError;
use ringkeeper::noderef::{dial, NodeRef};

#[derive(Parser, Debug)]
#[command(name = "ringkeeper-cli", about = "Interactive client for a ringkeeper ring")]
struct Args {
    /// Address of any live node to route requests through.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    #[arg(long, default_value_t = 50001)]
    port: u16,

    /// RPC timeout, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_millis: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let timeout = std::time::Duration::from_millis(args.timeout_millis);
    let entry = NodeRef::new(args.address.clone(), args.port);

    println!("connected to {entry}");
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        if let Err(e) = dispatch(&entry, timeout, &words).await {
            if e.is_transport_failure() {
                eprintln!("error: {e} (is the node up and reachable?)");
            } else {
                eprintln!("error: {e}");
            }
        }
        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}

async fn dispatch(entry: &NodeRef, timeout: std::time::Duration, words: &[&str]) -> Result<(), ChordError> {
    match words[0] {
        "put" => {
            let (key, value) = two_args(words, "put K V")?;
            let mut client = dial(entry, timeout).await?;
            let result = client
                .put(Request::new(chord_proto::PutRequest {
                    key: key.to_string(),
                    value: value.to_string(),
                }))
                .await?
                .into_inner();
            println!("put {:?} = {:?} (node {})", result.key, result.value, result.node_id);
        }
        "get" => {
            let key = one_arg(words, "get K")?;
            let mut client = dial(entry, timeout).await?;
            let result = client
                .lookup(Request::new(chord_proto::LookupRequest {
                    key: key.to_string(),
                }))
                .await?
                .into_inner();
            if result.status == chord_proto::KvStatus::Valid as i32 {
                println!("{} = {}", result.key, result.value);
            } else {
                println!("{} NOT_FOUND", result.key);
            }
        }
        "check" => {
            let mut client = dial(entry, timeout).await?;
            let mut failures = 0;
            for i in 0..50 {
                let key = format!("key-{i}");
                let expected = format!("value-{i}");
                let result = client
                    .lookup(Request::new(chord_proto::LookupRequest { key: key.clone() }))
                    .await?
                    .into_inner();
                let ok = result.status == chord_proto::KvStatus::Valid as i32 && result.value == expected;
                if !ok {
                    failures += 1;
                    println!("MISMATCH {key}: expected {expected:?}, got {:?} (status={})", result.value, result.status);
                }
            }
            println!("check complete: {}/50 ok", 50 - failures);
        }
        "get_all_data" => {
            let mut client = dial(entry, timeout).await?;
            let result = client
                .get_all_data(Request::new(chord_proto::GetAllDataRequest {
                    place: chord_proto::Place::Owner as i32,
                }))
                .await?
                .into_inner();
            for (k, v) in result.entries {
                println!("{k} = {v}");
            }
        }
        "add_node" => {
            let (_id, address, port) = three_args(words, "add_node ID ADDRESS PORT")?;
            let target = NodeRef::new(address, port.parse().map_err(|_| {
                ChordError::Usage(format!("invalid port: {port}"))
            })?);
            let mut target_client = dial(&target, timeout).await?;
            target_client
                .join(Request::new(ringkeeper::routing::node_ref_to_msg(entry)))
                .await?;
            println!("{target} joined through {entry}");
        }
        "leave_node" => {
            let (_id, address, port) = three_args(words, "leave_node ID ADDRESS PORT")?;
            let target = NodeRef::new(address, port.parse().map_err(|_| {
                ChordError::Usage(format!("invalid port: {port}"))
            })?);
            let mut target_client = dial(&target, timeout).await?;
            target_client
                .leave_network(Request::new(chord_proto::Empty {}))
                .await?;
            println!("{target} left the ring");
        }
        other => {
            return Err(ChordError::Usage(format!(
                "unknown command {other:?}; expected put/get/check/get_all_data/add_node/leave_node"
            )))
        }
    }
    Ok(())
}

fn one_arg<'a>(words: &[&'a str], usage: &str) -> Result<&'a str, ChordError> {
    words.get(1).copied().ok_or_else(|| ChordError::Usage(usage.to_string()))
}

fn two_args<'a>(words: &[&'a str], usage: &str) -> Result<(&'a str, &'a str), ChordError> {
    match (words.get(1), words.get(2)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ChordError::Usage(usage.to_string())),
    }
}

fn three_args<'a>(words: &[&'a str], usage: &str) -> Result<(&'a str, &'a str, &'a str), ChordError> {
    match (words.get(1), words.get(2), words.get(3)) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(ChordError::Usage(usage.to_string())),
    }
}
