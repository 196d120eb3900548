/*
[INPUT]:  Symbol identifier (e.g., "BTCUSD")
[OUTPUT]: Public market data (server time, ticker, order book)
[POS]:    Examples - public market data queries
[UPDATE]: When adding new market data endpoints
*/

use bybit_connector::*;

/// Example: query public market data on testnet (no credentials required)
#[tokio::main]
async fn main() {
    println!("=== Bybit Market Data Example ===\n");

    let client = match BybitClient::testnet(Market::InversePerpetual) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created for {:?}\n", client.market());

    let symbol = "BTCUSD";

    println!("Querying server time...");
    match client.server_time().await {
        Ok(body) => println!("✓ Server time: {}", body["time_now"]),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying ticker for {}...", symbol);
    match client
        .latest_information_for_symbol(params! { "symbol" => symbol })
        .await
    {
        Ok(body) => println!("✓ Ticker: {}", body["result"]),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying order book for {}...", symbol);
    match client.orderbook(params! { "symbol" => symbol }).await {
        Ok(body) => {
            let levels = body["result"].as_array().map_or(0, Vec::len);
            println!("✓ Order book levels: {}", levels);
        }
        Err(e) => println!("✗ Error: {}", e),
    }

    // Bulk queries keep input order; failures stay per item.
    println!("\nQuerying tickers in bulk...");
    let symbols = ["BTCUSD", "ETHUSD", "NOPEUSD"];
    let results = execute_bulk(
        |symbol| {
            let client = client.clone();
            let symbol = symbol.to_string();
            async move {
                client
                    .latest_information_for_symbol(params! { "symbol" => symbol })
                    .await
            }
        },
        symbols,
        DEFAULT_MAX_IN_PARALLEL,
    )
    .await;
    for (symbol, result) in symbols.iter().zip(results) {
        match result {
            Ok(_) => println!("  ✓ {}", symbol),
            Err(e) => println!("  ✗ {}: {}", symbol, e),
        }
    }

    println!("\n✓ Market data example complete");
}
