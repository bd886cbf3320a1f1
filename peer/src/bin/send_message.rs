//! One-shot message poster.
//!
//! Signs a message with a freshly generated identity and posts it to a
//! running peer server.

use serde_json::Value;

use chain::{Identity, Message};
use peer::PeerClient;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(addr), Some(text)) = (args.next(), args.next()) else {
        eprintln!("usage: send_message <server address> <message>");
        std::process::exit(1);
    };

    if let Err(e) = run(&addr, text) {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(addr: &str, text: String) -> Result<(), Box<dyn std::error::Error>> {
    let user = Identity::generate()?;
    tracing::info!("user generated:\n{}", user.public_pem()?);

    let message = Message::new(user, "messaging", Value::String(text))?;
    PeerClient::detached()?.post_message(addr, &message)?;

    tracing::info!("sent message");
    println!("{}", serde_json::to_string(&message.to_dto()?)?);
    Ok(())
}
