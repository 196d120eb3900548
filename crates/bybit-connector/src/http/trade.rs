/*
[INPUT]:  Order parameters (signed with the account credentials)
[OUTPUT]: Order acknowledgements and order queries
[POS]:    HTTP layer - active and conditional order endpoints (require auth)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use serde_json::Value;

use crate::http::routes;
use crate::http::{BybitClient, Result};
use crate::types::Params;

impl BybitClient {
    /// Place an active order
    pub async fn place_active_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::PLACE_ACTIVE_ORDER, params).await
    }

    /// List active orders (paginated)
    pub async fn get_active_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::GET_ACTIVE_ORDER, params).await
    }

    /// Cancel one active order by `order_id` or `order_link_id`
    pub async fn cancel_active_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::CANCEL_ACTIVE_ORDER, params).await
    }

    pub async fn cancel_all_active_orders(&self, params: Params) -> Result<Value> {
        self.call(&routes::CANCEL_ALL_ACTIVE_ORDERS, params).await
    }

    /// Amend price or quantity of an unfilled order
    pub async fn replace_active_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::REPLACE_ACTIVE_ORDER, params).await
    }

    /// Real-time query of active orders
    pub async fn query_active_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::QUERY_ACTIVE_ORDER, params).await
    }

    /// Place a conditional (stop) order
    pub async fn place_conditional_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::PLACE_CONDITIONAL_ORDER, params).await
    }

    pub async fn get_conditional_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::GET_CONDITIONAL_ORDER, params).await
    }

    pub async fn cancel_conditional_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::CANCEL_CONDITIONAL_ORDER, params).await
    }

    pub async fn cancel_all_conditional_orders(&self, params: Params) -> Result<Value> {
        self.call(&routes::CANCEL_ALL_CONDITIONAL_ORDERS, params)
            .await
    }

    pub async fn replace_conditional_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::REPLACE_CONDITIONAL_ORDER, params).await
    }

    pub async fn query_conditional_order(&self, params: Params) -> Result<Value> {
        self.call(&routes::QUERY_CONDITIONAL_ORDER, params).await
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::Credentials;
    use crate::http::{BybitClient, BybitError, ClientConfig};
    use crate::types::Market;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, market: Market) -> BybitClient {
        BybitClient::with_config_and_base_url(market, ClientConfig::default(), &server.uri())
            .unwrap()
            .with_credentials(Credentials::new("test-key", "test-secret"))
    }

    #[tokio::test]
    async fn test_place_active_order_inverse_futures_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/futures/private/order/create"))
            .and(body_partial_json(serde_json::json!({
                "symbol": "BTCUSDM23",
                "qty": 10,
                "api_key": "test-key",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ret_code": 0,
                "ret_msg": "OK",
                "result": {"order_id": "abc", "order_status": "Created"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, Market::InverseFutures);
        let body = client
            .place_active_order(crate::params! {
                "symbol" => "BTCUSDM23",
                "side" => "Buy",
                "order_type" => "Limit",
                "qty" => 10.0,
                "price" => 25000.5,
                "time_in_force" => "GoodTillCancel",
            })
            .await
            .unwrap();
        assert_eq!(body["result"]["order_id"], "abc");
    }

    #[tokio::test]
    async fn test_conditional_order_rejects_spot() {
        let server = MockServer::start().await;
        let client = client(&server, Market::Spot);
        let err = client
            .place_conditional_order(crate::params! { "symbol" => "BTCUSDT" })
            .await
            .unwrap_err();
        assert!(matches!(err, BybitError::Unsupported { .. }));
    }
}
