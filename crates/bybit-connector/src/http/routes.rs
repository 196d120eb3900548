/*
[INPUT]:  Endpoint name and selected market
[OUTPUT]: HTTP verb, auth requirement and path for the market
[POS]:    HTTP layer - static route table behind the endpoint methods
[UPDATE]: When Bybit adds, moves or retires an endpoint
*/

use reqwest::Method;

use crate::types::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
    Get,
    Post,
}

impl Verb {
    pub(crate) fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
        }
    }
}

/// One endpoint, with a path per market (`None` where the market lacks it).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Route {
    pub name: &'static str,
    pub verb: Verb,
    pub private: bool,
    pub linear: Option<&'static str>,
    pub inverse: Option<&'static str>,
    pub futures: Option<&'static str>,
    pub spot: Option<&'static str>,
}

impl Route {
    pub(crate) fn path(&self, market: Market) -> Option<&'static str> {
        match market {
            Market::UsdtPerpetual => self.linear,
            Market::InversePerpetual => self.inverse,
            Market::InverseFutures => self.futures,
            Market::Spot => self.spot,
        }
    }
}

const fn public(
    name: &'static str,
    linear: Option<&'static str>,
    inverse: Option<&'static str>,
    futures: Option<&'static str>,
    spot: Option<&'static str>,
) -> Route {
    Route {
        name,
        verb: Verb::Get,
        private: false,
        linear,
        inverse,
        futures,
        spot,
    }
}

const fn private(
    name: &'static str,
    verb: Verb,
    linear: Option<&'static str>,
    inverse: Option<&'static str>,
    futures: Option<&'static str>,
) -> Route {
    Route {
        name,
        verb,
        private: true,
        linear,
        inverse,
        futures,
        spot: None,
    }
}

// Market data

pub(crate) const ORDERBOOK: Route = public(
    "orderbook",
    Some("/v2/public/orderBook/L2"),
    Some("/v2/public/orderBook/L2"),
    Some("/v2/public/orderBook/L2"),
    Some("/spot/quote/v1/depth"),
);
pub(crate) const QUERY_KLINE: Route = public(
    "query_kline",
    Some("/public/linear/kline"),
    Some("/v2/public/kline/list"),
    Some("/v2/public/kline/list"),
    Some("/spot/quote/v1/kline"),
);
pub(crate) const LATEST_INFORMATION_FOR_SYMBOL: Route = public(
    "latest_information_for_symbol",
    Some("/v2/public/tickers"),
    Some("/v2/public/tickers"),
    Some("/v2/public/tickers"),
    Some("/spot/quote/v1/ticker/24hr"),
);
pub(crate) const PUBLIC_TRADING_RECORDS: Route = public(
    "public_trading_records",
    Some("/public/linear/recent-trading-records"),
    Some("/v2/public/trading-records"),
    Some("/v2/public/trading-records"),
    Some("/spot/quote/v1/trades"),
);
pub(crate) const QUERY_SYMBOL: Route = public(
    "query_symbol",
    Some("/v2/public/symbols"),
    Some("/v2/public/symbols"),
    Some("/v2/public/symbols"),
    Some("/spot/v1/symbols"),
);
pub(crate) const LIQUIDATED_ORDERS: Route = public(
    "liquidated_orders",
    Some("/v2/public/liq-records"),
    Some("/v2/public/liq-records"),
    Some("/v2/public/liq-records"),
    None,
);
pub(crate) const QUERY_MARK_PRICE_KLINE: Route = public(
    "query_mark_price_kline",
    Some("/public/linear/mark-price-kline"),
    Some("/v2/public/mark-price-kline"),
    Some("/v2/public/mark-price-kline"),
    None,
);
pub(crate) const QUERY_INDEX_PRICE_KLINE: Route = public(
    "query_index_price_kline",
    Some("/public/linear/index-price-kline"),
    Some("/v2/public/index-price-kline"),
    Some("/v2/public/index-price-kline"),
    None,
);
pub(crate) const QUERY_PREMIUM_INDEX_KLINE: Route = public(
    "query_premium_index_kline",
    Some("/public/linear/premium-index-kline"),
    Some("/v2/public/premium-index-kline"),
    Some("/v2/public/premium-index-kline"),
    None,
);
pub(crate) const OPEN_INTEREST: Route = public(
    "open_interest",
    Some("/v2/public/open-interest"),
    Some("/v2/public/open-interest"),
    Some("/v2/public/open-interest"),
    None,
);
pub(crate) const LATEST_BIG_DEAL: Route = public(
    "latest_big_deal",
    Some("/v2/public/big-deal"),
    Some("/v2/public/big-deal"),
    Some("/v2/public/big-deal"),
    None,
);
pub(crate) const LONG_SHORT_RATIO: Route = public(
    "long_short_ratio",
    Some("/v2/public/account-ratio"),
    Some("/v2/public/account-ratio"),
    Some("/v2/public/account-ratio"),
    None,
);
pub(crate) const GET_RISK_LIMIT: Route = public(
    "get_risk_limit",
    Some("/public/linear/risk-limit"),
    Some("/v2/public/risk-limit/list"),
    Some("/v2/public/risk-limit/list"),
    None,
);
pub(crate) const GET_THE_LAST_FUNDING_RATE: Route = public(
    "get_the_last_funding_rate",
    Some("/public/linear/funding/prev-funding-rate"),
    Some("/v2/public/funding/prev-funding-rate"),
    None,
    None,
);
pub(crate) const SERVER_TIME: Route = public(
    "server_time",
    Some("/v2/public/time"),
    Some("/v2/public/time"),
    Some("/v2/public/time"),
    Some("/spot/v1/time"),
);
pub(crate) const ANNOUNCEMENT: Route = public(
    "announcement",
    Some("/v2/public/announcement"),
    Some("/v2/public/announcement"),
    Some("/v2/public/announcement"),
    None,
);

// Active orders

pub(crate) const PLACE_ACTIVE_ORDER: Route = private(
    "place_active_order",
    Verb::Post,
    Some("/private/linear/order/create"),
    Some("/v2/private/order/create"),
    Some("/futures/private/order/create"),
);
pub(crate) const GET_ACTIVE_ORDER: Route = private(
    "get_active_order",
    Verb::Get,
    Some("/private/linear/order/list"),
    Some("/v2/private/order/list"),
    Some("/futures/private/order/list"),
);
pub(crate) const CANCEL_ACTIVE_ORDER: Route = private(
    "cancel_active_order",
    Verb::Post,
    Some("/private/linear/order/cancel"),
    Some("/v2/private/order/cancel"),
    Some("/futures/private/order/cancel"),
);
pub(crate) const CANCEL_ALL_ACTIVE_ORDERS: Route = private(
    "cancel_all_active_orders",
    Verb::Post,
    Some("/private/linear/order/cancel-all"),
    Some("/v2/private/order/cancelAll"),
    Some("/futures/private/order/cancelAll"),
);
pub(crate) const REPLACE_ACTIVE_ORDER: Route = private(
    "replace_active_order",
    Verb::Post,
    Some("/private/linear/order/replace"),
    Some("/v2/private/order/replace"),
    Some("/futures/private/order/replace"),
);
pub(crate) const QUERY_ACTIVE_ORDER: Route = private(
    "query_active_order",
    Verb::Get,
    Some("/private/linear/order/search"),
    Some("/v2/private/order"),
    Some("/futures/private/order"),
);

// Conditional orders

pub(crate) const PLACE_CONDITIONAL_ORDER: Route = private(
    "place_conditional_order",
    Verb::Post,
    Some("/private/linear/stop-order/create"),
    Some("/v2/private/stop-order/create"),
    Some("/futures/private/stop-order/create"),
);
pub(crate) const GET_CONDITIONAL_ORDER: Route = private(
    "get_conditional_order",
    Verb::Get,
    Some("/private/linear/stop-order/list"),
    Some("/v2/private/stop-order/list"),
    Some("/futures/private/stop-order/list"),
);
pub(crate) const CANCEL_CONDITIONAL_ORDER: Route = private(
    "cancel_conditional_order",
    Verb::Post,
    Some("/private/linear/stop-order/cancel"),
    Some("/v2/private/stop-order/cancel"),
    Some("/futures/private/stop-order/cancel"),
);
pub(crate) const CANCEL_ALL_CONDITIONAL_ORDERS: Route = private(
    "cancel_all_conditional_orders",
    Verb::Post,
    Some("/private/linear/stop-order/cancel-all"),
    Some("/v2/private/stop-order/cancelAll"),
    Some("/futures/private/stop-order/cancelAll"),
);
pub(crate) const REPLACE_CONDITIONAL_ORDER: Route = private(
    "replace_conditional_order",
    Verb::Post,
    Some("/private/linear/stop-order/replace"),
    Some("/v2/private/stop-order/replace"),
    Some("/futures/private/stop-order/replace"),
);
pub(crate) const QUERY_CONDITIONAL_ORDER: Route = private(
    "query_conditional_order",
    Verb::Get,
    Some("/private/linear/stop-order/search"),
    Some("/v2/private/stop-order"),
    Some("/futures/private/stop-order"),
);

// Positions

pub(crate) const MY_POSITION: Route = private(
    "my_position",
    Verb::Get,
    Some("/private/linear/position/list"),
    Some("/v2/private/position/list"),
    Some("/futures/private/position/list"),
);
pub(crate) const SET_AUTO_ADD_MARGIN: Route = private(
    "set_auto_add_margin",
    Verb::Post,
    Some("/private/linear/position/set-auto-add-margin"),
    None,
    None,
);
pub(crate) const SET_LEVERAGE: Route = private(
    "set_leverage",
    Verb::Post,
    Some("/private/linear/position/set-leverage"),
    Some("/v2/private/position/leverage/save"),
    Some("/futures/private/position/leverage/save"),
);
pub(crate) const CROSS_ISOLATED_MARGIN_SWITCH: Route = private(
    "cross_isolated_margin_switch",
    Verb::Post,
    Some("/private/linear/position/switch-isolated"),
    Some("/v2/private/position/switch-isolated"),
    Some("/futures/private/position/switch-isolated"),
);
pub(crate) const POSITION_MODE_SWITCH: Route = private(
    "position_mode_switch",
    Verb::Post,
    Some("/private/linear/position/switch-mode"),
    Some("/v2/private/position/switch-mode"),
    Some("/futures/private/position/switch-mode"),
);
pub(crate) const FULL_PARTIAL_POSITION_TP_SL_SWITCH: Route = private(
    "full_partial_position_tp_sl_switch",
    Verb::Post,
    Some("/private/linear/tpsl/switch-mode"),
    Some("/v2/private/tpsl/switch-mode"),
    Some("/futures/private/tpsl/switch-mode"),
);
pub(crate) const SET_TRADING_STOP: Route = private(
    "set_trading_stop",
    Verb::Post,
    Some("/private/linear/position/trading-stop"),
    Some("/v2/private/position/trading-stop"),
    Some("/futures/private/position/trading-stop"),
);
pub(crate) const ADD_REDUCE_MARGIN: Route = private(
    "add_reduce_margin",
    Verb::Post,
    Some("/private/linear/position/add-margin"),
    Some("/v2/private/position/change-position-margin"),
    Some("/futures/private/position/change-position-margin"),
);
pub(crate) const USER_TRADE_RECORDS: Route = private(
    "user_trade_records",
    Verb::Get,
    Some("/private/linear/trade/execution/list"),
    Some("/v2/private/execution/list"),
    Some("/futures/private/execution/list"),
);
pub(crate) const CLOSED_PROFIT_AND_LOSS: Route = private(
    "closed_profit_and_loss",
    Verb::Get,
    Some("/private/linear/trade/closed-pnl/list"),
    Some("/v2/private/trade/closed-pnl/list"),
    Some("/futures/private/trade/closed-pnl/list"),
);
pub(crate) const SET_RISK_LIMIT: Route = private(
    "set_risk_limit",
    Verb::Post,
    Some("/private/linear/position/set-risk"),
    Some("/v2/private/position/risk-limit"),
    Some("/futures/private/position/risk-limit"),
);
pub(crate) const MY_LAST_FUNDING_FEE: Route = private(
    "my_last_funding_fee",
    Verb::Get,
    Some("/private/linear/funding/prev-funding"),
    Some("/v2/private/funding/prev-funding"),
    None,
);
pub(crate) const PREDICTED_FUNDING_RATE: Route = private(
    "predicted_funding_rate",
    Verb::Get,
    Some("/private/linear/funding/predicted-funding"),
    Some("/v2/private/funding/predicted-funding"),
    None,
);

// Account

const fn account(name: &'static str, path: &'static str) -> Route {
    private(name, Verb::Get, Some(path), Some(path), Some(path))
}

pub(crate) const GET_WALLET_BALANCE: Route = Route {
    spot: Some("/spot/v1/account"),
    ..account("get_wallet_balance", "/v2/private/wallet/balance")
};
pub(crate) const WALLET_FUND_RECORDS: Route =
    account("wallet_fund_records", "/v2/private/wallet/fund/records");
pub(crate) const WITHDRAW_RECORDS: Route =
    account("withdraw_records", "/v2/private/wallet/withdraw/list");
pub(crate) const ASSET_EXCHANGE_RECORDS: Route =
    account("asset_exchange_records", "/v2/private/exchange-order/list");
pub(crate) const API_KEY_INFO: Route = account("api_key_info", "/v2/private/account/api-key");
pub(crate) const LCP_INFO: Route = account("lcp_info", "/v2/private/account/lcp");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_selects_market_path() {
        assert_eq!(
            PLACE_ACTIVE_ORDER.path(Market::UsdtPerpetual),
            Some("/private/linear/order/create")
        );
        assert_eq!(
            PLACE_ACTIVE_ORDER.path(Market::InverseFutures),
            Some("/futures/private/order/create")
        );
        assert_eq!(PLACE_ACTIVE_ORDER.path(Market::Spot), None);
        assert_eq!(SET_AUTO_ADD_MARGIN.path(Market::InversePerpetual), None);
    }

    #[test]
    fn test_wallet_balance_spot_override() {
        assert!(GET_WALLET_BALANCE.private);
        assert_eq!(GET_WALLET_BALANCE.path(Market::Spot), Some("/spot/v1/account"));
        assert_eq!(
            GET_WALLET_BALANCE.path(Market::InversePerpetual),
            Some("/v2/private/wallet/balance")
        );
    }
}
