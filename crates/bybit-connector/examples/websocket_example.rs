/*
[INPUT]:  Public stream topics and optional API credentials
[OUTPUT]: Periodic snapshots of streamed topic data
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use bybit_connector::*;
use tokio::time::{Duration, sleep};

/// Example: stream the inverse perpetual order book and trades from testnet
///
/// The session runs in the background; data is polled with `fetch`.
/// Set BYBIT_API_KEY / BYBIT_API_SECRET to also follow private positions.
#[tokio::main]
async fn main() {
    println!("=== Bybit WebSocket Example ===\n");

    let credentials = Credentials::from_env();
    let private = credentials.is_some();
    let mut config = StreamConfig::for_market(Market::InversePerpetual, private, true)
        .subscriptions(["orderBookL2_25.BTCUSD", "trade.BTCUSD"]);
    if let Some(credentials) = credentials {
        config = config.credentials(credentials).subscribe("position");
    }

    let ws = match BybitWebSocket::connect(config).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            return;
        }
    };
    println!("✓ Connected to {} ({:?})\n", ws.url(), ws.state());

    for round in 1..=5 {
        sleep(Duration::from_secs(2)).await;
        let book = ws.fetch("orderBookL2_25.BTCUSD").unwrap_or_default();
        let trades = ws.fetch("trade.BTCUSD").unwrap_or_default();
        println!(
            "[{}] state={:?} book_levels={} new_trades={}",
            round,
            ws.state(),
            book.len(),
            trades.len()
        );
        if private {
            let positions = ws.fetch("position").unwrap_or_default();
            println!("    positions={}", positions.len());
        }
    }

    ws.exit().await;
    println!("\n✓ WebSocket example complete");
}
