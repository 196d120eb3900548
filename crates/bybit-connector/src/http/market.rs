/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (order book, klines, tickers, trades, funding)
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use serde_json::Value;

use crate::http::routes;
use crate::http::{BybitClient, Result};
use crate::types::params::rename_key;
use crate::types::Params;

impl BybitClient {
    /// Order book (top 25 levels per side for derivatives)
    pub async fn orderbook(&self, params: Params) -> Result<Value> {
        self.call(&routes::ORDERBOOK, params).await
    }

    /// Kline history. Accepts `from_time` in place of `from`.
    pub async fn query_kline(&self, mut params: Params) -> Result<Value> {
        rename_key(&mut params, "from_time", "from");
        self.call(&routes::QUERY_KLINE, params).await
    }

    /// Latest ticker information; all symbols when `symbol` is omitted
    pub async fn latest_information_for_symbol(&self, params: Params) -> Result<Value> {
        self.call(&routes::LATEST_INFORMATION_FOR_SYMBOL, params)
            .await
    }

    /// Recent public trades. Accepts `from_id` in place of `from`.
    pub async fn public_trading_records(&self, mut params: Params) -> Result<Value> {
        rename_key(&mut params, "from_id", "from");
        self.call(&routes::PUBLIC_TRADING_RECORDS, params).await
    }

    /// Symbol list with trading rules
    pub async fn query_symbol(&self) -> Result<Value> {
        self.call(&routes::QUERY_SYMBOL, Params::new()).await
    }

    pub async fn liquidated_orders(&self, params: Params) -> Result<Value> {
        self.call(&routes::LIQUIDATED_ORDERS, params).await
    }

    pub async fn query_mark_price_kline(&self, mut params: Params) -> Result<Value> {
        rename_key(&mut params, "from_time", "from");
        self.call(&routes::QUERY_MARK_PRICE_KLINE, params).await
    }

    pub async fn query_index_price_kline(&self, mut params: Params) -> Result<Value> {
        rename_key(&mut params, "from_time", "from");
        self.call(&routes::QUERY_INDEX_PRICE_KLINE, params).await
    }

    pub async fn query_premium_index_kline(&self, mut params: Params) -> Result<Value> {
        rename_key(&mut params, "from_time", "from");
        self.call(&routes::QUERY_PREMIUM_INDEX_KLINE, params).await
    }

    pub async fn open_interest(&self, params: Params) -> Result<Value> {
        self.call(&routes::OPEN_INTEREST, params).await
    }

    pub async fn latest_big_deal(&self, params: Params) -> Result<Value> {
        self.call(&routes::LATEST_BIG_DEAL, params).await
    }

    pub async fn long_short_ratio(&self, params: Params) -> Result<Value> {
        self.call(&routes::LONG_SHORT_RATIO, params).await
    }

    pub async fn get_risk_limit(&self, params: Params) -> Result<Value> {
        self.call(&routes::GET_RISK_LIMIT, params).await
    }

    /// Funding rate of the last settlement
    pub async fn get_the_last_funding_rate(&self, params: Params) -> Result<Value> {
        self.call(&routes::GET_THE_LAST_FUNDING_RATE, params).await
    }

    /// Exchange server time
    pub async fn server_time(&self) -> Result<Value> {
        self.call(&routes::SERVER_TIME, Params::new()).await
    }

    /// Announcements from the last 30 days
    pub async fn announcement(&self) -> Result<Value> {
        self.call(&routes::ANNOUNCEMENT, Params::new()).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{BybitClient, BybitError, ClientConfig};
    use crate::types::Market;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer, market: Market) -> BybitClient {
        BybitClient::with_config_and_base_url(market, ClientConfig::default(), &server.uri())
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_kline_renames_from_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public/linear/kline"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("interval", "1"))
            .and(query_param("from", "1600000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ret_code": 0,
                "ret_msg": "OK",
                "result": [{"symbol": "BTCUSDT", "open": 10000.5}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, Market::UsdtPerpetual).await;
        let body = client
            .query_kline(crate::params! {
                "symbol" => "BTCUSDT",
                "interval" => "1",
                "from_time" => 1_600_000_000,
            })
            .await
            .unwrap();
        assert_eq!(body["result"][0]["open"], 10000.5);
    }

    #[tokio::test]
    async fn test_spot_server_time_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spot/v1/time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ret_code": 0,
                "result": {"serverTime": 1_700_000_000_000_i64}
            })))
            .mount(&server)
            .await;

        let client = client(&server, Market::Spot).await;
        let body = client.server_time().await.unwrap();
        assert_eq!(body["result"]["serverTime"], 1_700_000_000_000_i64);
    }

    #[tokio::test]
    async fn test_unsupported_endpoint_skips_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, Market::Spot).await;
        let err = client.open_interest(crate::params! {}).await.unwrap_err();
        assert!(matches!(
            err,
            BybitError::Unsupported { endpoint: "open_interest", market: Market::Spot }
        ));
    }
}
