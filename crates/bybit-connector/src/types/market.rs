/*
[INPUT]:  Market selection, testnet flag, optional alternate domain
[OUTPUT]: REST base URLs and WebSocket stream URLs per market
[POS]:    Data layer - market identity shared by HTTP and WebSocket layers
[UPDATE]: When Bybit adds a market or moves a stream path
*/

use std::fmt;

use serde::{Deserialize, Serialize};

const REST_MAINNET: &str = "https://api.bybit.com";
const REST_TESTNET: &str = "https://api-testnet.bybit.com";

const SUBDOMAIN_MAINNET: &str = "stream";
const SUBDOMAIN_TESTNET: &str = "stream-testnet";
const DOMAIN_MAIN: &str = "bybit";

/// Bybit market families. Each family has its own REST paths and stream hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    #[default]
    UsdtPerpetual,
    InversePerpetual,
    InverseFutures,
    Spot,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::UsdtPerpetual => "usdt_perpetual",
            Market::InversePerpetual => "inverse_perpetual",
            Market::InverseFutures => "inverse_futures",
            Market::Spot => "spot",
        }
    }

    /// REST base URL for mainnet or testnet.
    pub fn rest_url(&self, testnet: bool) -> &'static str {
        if testnet { REST_TESTNET } else { REST_MAINNET }
    }

    /// WebSocket stream URL.
    ///
    /// `domain` overrides the second-level domain (e.g. `bytick`); pass `None`
    /// for the default `bybit`.
    pub fn stream_url(&self, private: bool, testnet: bool, domain: Option<&str>) -> String {
        let subdomain = if testnet {
            SUBDOMAIN_TESTNET
        } else {
            SUBDOMAIN_MAINNET
        };
        let domain = domain.filter(|d| !d.is_empty()).unwrap_or(DOMAIN_MAIN);
        let path = match (self, private) {
            (Market::UsdtPerpetual, false) => "realtime_public",
            (Market::UsdtPerpetual, true) => "realtime_private",
            (Market::InversePerpetual | Market::InverseFutures, _) => "realtime",
            (Market::Spot, false) => "spot/quote/ws/v2",
            (Market::Spot, true) => "spot/ws",
        };
        format!("wss://{subdomain}.{domain}.com/{path}")
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_urls() {
        assert_eq!(
            Market::UsdtPerpetual.stream_url(false, true, None),
            "wss://stream-testnet.bybit.com/realtime_public"
        );
        assert_eq!(
            Market::UsdtPerpetual.stream_url(true, false, Some("bytick")),
            "wss://stream.bytick.com/realtime_private"
        );
        assert_eq!(
            Market::InverseFutures.stream_url(true, false, Some("")),
            "wss://stream.bybit.com/realtime"
        );
    }

    #[test]
    fn test_rest_urls() {
        assert_eq!(Market::Spot.rest_url(false), "https://api.bybit.com");
        assert_eq!(Market::Spot.rest_url(true), "https://api-testnet.bybit.com");
    }
}
