//! Cluster sanity tool, grounded in the teacher's `validate_cluster`
//! binary: connects to every given node, reads its view of the ring, and
//! checks invariants P1/P2 (ownership, ring closure) from spec.md §8.

use std::env;
use std::error::Error;

use tonic::Request;

use ringkeeper::chord_proto;
use ringkeeper::noderef::{dial, NodeRef};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: validate-ring ADDRESS:PORT [ADDRESS:PORT ...]");
        std::process::exit(1);
    }

    let mut nodes = Vec::new();
    for spec in args.iter().skip(1) {
        let (address, port) = spec
            .rsplit_once(':')
            .ok_or("expected ADDRESS:PORT")?;
        let port: u16 = port.parse()?;
        let node = NodeRef::new(address, port);
        let mut client = dial(&node, std::time::Duration::from_secs(2)).await?;
        let predecessor = client
            .get_predecessor(Request::new(chord_proto::Empty {}))
            .await?
            .into_inner();
        nodes.push((node, predecessor));
    }

    nodes.sort_by_key(|(n, _)| n.id);

    let mut ok = true;
    for (i, (node, predecessor)) in nodes.iter().enumerate() {
        if !predecessor.valid {
            println!("{node}: no predecessor set yet (ring may still be stabilizing)");
            continue;
        }
        let expected = &nodes[(i + nodes.len() - 1) % nodes.len()].0;
        if predecessor.id != expected.id {
            println!(
                "{node}: predecessor mismatch, expected {expected} got id {}",
                predecessor.id
            );
            ok = false;
        }
    }

    if ok {
        println!("ring looks consistent across {} node(s)", nodes.len());
    } else {
        println!("ring is inconsistent");
        std::process::exit(1);
    }

    Ok(())
}
