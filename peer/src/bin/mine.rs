//! Mining loop driver.
//!
//! Takes a server address, generates a throwaway miner identity, and
//! loops forever: fetch the tip, search a key, close the local copy,
//! submit the closure, announce it as a message, and continue on top of
//! the fresh tip. A rejected closure (another miner won the race) drops
//! back to refetching the tip.

use serde_json::json;

use chain::{Identity, Message, mine};
use peer::PeerClient;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let Some(addr) = std::env::args().nth(1) else {
        eprintln!("usage: mine <server address>");
        std::process::exit(1);
    };

    if let Err(e) = run(&addr) {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = Identity::generate()?;
    tracing::info!("miner identity generated:\n{}", user.public_pem()?);

    let client = PeerClient::detached()?;

    loop {
        let mut leaf = client.get_block(addr, -1)?;
        tracing::info!(
            index = leaf.index(),
            parent = %hex::encode(leaf.parent().map(|p| p.signature()).unwrap_or_default()),
            "fetched tip",
        );

        loop {
            let key = mine(&leaf)?;
            tracing::info!("found key {}", hex::encode(key));

            let mut next = leaf.close(&user, &key, None, None)?;

            if let Err(e) = client.post_close_block(addr, &leaf) {
                // Another miner closed this tip first.
                tracing::warn!("closure rejected, refetching tip: {e}");
                break;
            }

            let announcement = Message::new(
                user.clone(),
                "chain.mining",
                json!({
                    "from": hex::encode(leaf.signature().unwrap_or_default()),
                    "to": user.public_pem()?,
                }),
            )?;
            if let Err(e) = client.post_message(addr, &announcement) {
                tracing::warn!("failed to announce the closure: {e}");
            }
            next.pool(announcement)?;

            tracing::info!(
                index = leaf.index(),
                signature = %hex::encode(leaf.signature().unwrap_or_default()),
                "closed block",
            );
            leaf = next;
        }
    }
}
