/*
[INPUT]:  Mock HTTP responses
[OUTPUT]: Test results for the request executor and endpoint methods
[POS]:    Integration tests - HTTP endpoints
[UPDATE]: When HTTP endpoints or retry policy change
*/

mod common;

use std::collections::HashSet;
use std::time::Duration;

use bybit_connector::{
    BybitClient, BybitError, ClientConfig, HmacSigner, Market, Params, RequestSigner, params,
};
use common::{TEST_API_SECRET, client_for, envelope, fast_config, setup_mock_server};
use reqwest::Method;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[test]
fn test_client_creation() {
    let client = assert_ok!(BybitClient::new(Market::InversePerpetual));
    assert_eq!(client.market(), Market::InversePerpetual);
    assert!(!client.has_credentials());
    assert_ok!(BybitClient::testnet(Market::Spot));
}

#[test]
fn test_client_config_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.recv_window, 5000);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_delay, Duration::from_secs(3));
    assert!(!config.force_retry);
    assert!(!config.log_requests);
}

#[tokio::test]
async fn test_retry_code_exhausts_attempt_budget() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/private/linear/order/create"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(10002, "invalid request, please check your timestamp", Value::Null)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, Market::UsdtPerpetual, fast_config());
    let err = assert_err!(
        client
            .place_active_order(params! { "symbol" => "BTCUSDT", "qty" => 1 })
            .await
    );
    match err {
        BybitError::InvalidRequest { code, request, .. } => {
            assert_eq!(code, 10002);
            assert!(request.contains("/private/linear/order/create"));
            assert!(!request.contains("test-key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_retry_code_fails_immediately() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/private/position/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(10001, "params error", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Market::InversePerpetual, fast_config());
    let err = assert_err!(client.my_position(params! { "symbol" => "BTCUSD" }).await);
    assert_eq!(err.code(), Some(10001));
}

#[tokio::test]
async fn test_ignored_code_returns_body() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/private/linear/position/set-leverage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(34036, "leverage not modified", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        ignore_codes: HashSet::from([34036]),
        ..fast_config()
    };
    let client = client_for(&server, Market::UsdtPerpetual, config);
    let body = assert_ok!(
        client
            .set_leverage(params! { "symbol" => "BTCUSDT", "buy_leverage" => 5, "sell_leverage" => 5 })
            .await
    );
    assert_eq!(body["ret_code"], 34036);
}

#[tokio::test]
async fn test_force_retry_retries_any_code() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/private/order/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(20001, "order not exists", Value::Null)))
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig {
        force_retry: true,
        max_retries: 2,
        ..fast_config()
    };
    let client = client_for(&server, Market::InversePerpetual, config);
    assert_err!(client.get_active_order(params! { "symbol" => "BTCUSD" }).await);
}

#[tokio::test]
async fn test_rate_limit_waits_for_reset() {
    let server = setup_mock_server().await;
    let reset_in_past = chrono::Utc::now().timestamp_millis() - 1000;
    Mock::given(method("GET"))
        .and(path("/v2/private/wallet/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ret_code": 10006,
            "ret_msg": "too many visits",
            "rate_limit_reset_ms": reset_in_past,
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/private/wallet/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, "OK", json!({"BTC": {}}))))
        .mount(&server)
        .await;

    // The fixed delay would exceed the test timeout; only the reset time counts.
    let config = ClientConfig {
        retry_delay: Duration::from_secs(60),
        ..ClientConfig::default()
    };
    let client = client_for(&server, Market::InversePerpetual, config);
    let body = tokio::time::timeout(
        Duration::from_secs(5),
        client.get_wallet_balance(params! { "coin" => "BTC" }),
    )
    .await
    .expect("rate limit wait should honour the reset time");
    assert_eq!(assert_ok!(body)["ret_code"], 0);
}

#[tokio::test]
async fn test_server_error_without_envelope_is_retried() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/public/time"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, Market::InversePerpetual, fast_config());
    match assert_err!(client.server_time().await) {
        BybitError::FailedRequest { status_code, .. } => assert_eq!(status_code, Some(502)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/public/time"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Market::InversePerpetual, fast_config());
    match assert_err!(client.server_time().await) {
        BybitError::FailedRequest { status_code, .. } => assert_eq!(status_code, Some(403)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_failure_surfaces_failed_request() {
    // Nothing listens on the discard port.
    let client = BybitClient::with_config_and_base_url(
        Market::InversePerpetual,
        ClientConfig {
            max_retries: 2,
            ..fast_config()
        },
        "http://127.0.0.1:9",
    )
    .unwrap();
    let err = assert_err!(client.server_time().await);
    assert!(matches!(err, BybitError::FailedRequest { .. }));
}

#[tokio::test]
async fn test_signed_post_body() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/v2/private/order/cancel"))
        .and(body_partial_json(json!({"symbol": "BTCUSD", "order_id": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, "OK", json!({"order_id": "abc"}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Market::InversePerpetual, fast_config());
    assert_ok!(
        client
            .cancel_active_order(params! { "symbol" => "BTCUSD", "order_id" => "abc" })
            .await
    );

    let requests = server.received_requests().await.unwrap();
    let body: Params = serde_json::from_slice(&requests[0].body).unwrap();
    let sign = body["sign"].as_str().unwrap().to_string();
    let expected = HmacSigner::new(TEST_API_SECRET).sign(&RequestSigner::canonical_query(&body));
    assert_eq!(sign, expected);
    assert_eq!(body["recv_window"], 5000);
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_referral_header() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/public/announcement"))
        .and(header("Referer", "affiliate-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, "OK", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        referral_id: Some("affiliate-42".to_string()),
        ..fast_config()
    };
    let client = client_for(&server, Market::InversePerpetual, config);
    assert_ok!(client.announcement().await);
}

#[tokio::test]
async fn test_raw_execute_public_get() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/v2/public/tickers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {"list": [{"symbol": "BTCUSD"}]}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Market::InversePerpetual, fast_config());
    let body = assert_ok!(
        client
            .execute(Method::GET, "/v2/public/tickers", params! { "symbol" => "BTCUSD" }, false)
            .await
    );
    assert_eq!(body["result"]["list"][0]["symbol"], "BTCUSD");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query_pairs().all(|(key, _)| key != "sign"));
}
