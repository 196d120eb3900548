/*
[INPUT]:  Position parameters (signed with the account credentials)
[OUTPUT]: Position state, leverage/margin changes, trade and PnL history
[POS]:    HTTP layer - position endpoints (require auth)
[UPDATE]: When adding position endpoints or changing close-out behavior
*/

use serde_json::Value;
use tracing::{info, warn};

use crate::http::bulk::DEFAULT_MAX_IN_PARALLEL;
use crate::http::routes;
use crate::http::{BybitClient, Result};
use crate::types::{Params, Side};

impl BybitClient {
    /// Positions for one symbol, or all symbols when omitted
    pub async fn my_position(&self, params: Params) -> Result<Value> {
        self.call(&routes::MY_POSITION, params).await
    }

    /// USDT perpetual only
    pub async fn set_auto_add_margin(&self, params: Params) -> Result<Value> {
        self.call(&routes::SET_AUTO_ADD_MARGIN, params).await
    }

    pub async fn set_leverage(&self, params: Params) -> Result<Value> {
        self.call(&routes::SET_LEVERAGE, params).await
    }

    pub async fn cross_isolated_margin_switch(&self, params: Params) -> Result<Value> {
        self.call(&routes::CROSS_ISOLATED_MARGIN_SWITCH, params).await
    }

    /// Switch between one-way and hedge position mode
    pub async fn position_mode_switch(&self, params: Params) -> Result<Value> {
        self.call(&routes::POSITION_MODE_SWITCH, params).await
    }

    pub async fn full_partial_position_tp_sl_switch(&self, params: Params) -> Result<Value> {
        self.call(&routes::FULL_PARTIAL_POSITION_TP_SL_SWITCH, params)
            .await
    }

    /// Take-profit, stop-loss and trailing stop for an open position
    pub async fn set_trading_stop(&self, params: Params) -> Result<Value> {
        self.call(&routes::SET_TRADING_STOP, params).await
    }

    pub async fn add_reduce_margin(&self, params: Params) -> Result<Value> {
        self.call(&routes::ADD_REDUCE_MARGIN, params).await
    }

    /// Own executions
    pub async fn user_trade_records(&self, params: Params) -> Result<Value> {
        self.call(&routes::USER_TRADE_RECORDS, params).await
    }

    pub async fn closed_profit_and_loss(&self, params: Params) -> Result<Value> {
        self.call(&routes::CLOSED_PROFIT_AND_LOSS, params).await
    }

    pub async fn set_risk_limit(&self, params: Params) -> Result<Value> {
        self.call(&routes::SET_RISK_LIMIT, params).await
    }

    /// Funding fee paid or received at the last settlement
    pub async fn my_last_funding_fee(&self, params: Params) -> Result<Value> {
        self.call(&routes::MY_LAST_FUNDING_FEE, params).await
    }

    pub async fn predicted_funding_rate(&self, params: Params) -> Result<Value> {
        self.call(&routes::PREDICTED_FUNDING_RATE, params).await
    }

    /// Close every open side of `symbol` with a reduce-only market order.
    ///
    /// Reads the position first, then submits one opposite-side order per
    /// side with a non-zero size. Returns an empty list when flat.
    pub async fn close_position(&self, symbol: &str) -> Result<Vec<Result<Value>>> {
        let body = self
            .my_position(crate::params! { "symbol" => symbol })
            .await?;

        let orders = closing_orders(symbol, &body);
        if orders.is_empty() {
            warn!(symbol, "no position detected");
            return Ok(Vec::new());
        }

        info!(symbol, orders = orders.len(), "closing position");
        Ok(self
            .place_active_order_bulk(orders, DEFAULT_MAX_IN_PARALLEL)
            .await)
    }
}

/// Reduce-only market orders that flatten every side listed in a position
/// response. Entries may be bare or wrapped in `{"data": ...}`.
fn closing_orders(symbol: &str, body: &Value) -> Vec<Params> {
    let positions: Vec<&Value> = match body.get("result") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    positions
        .into_iter()
        .map(|position| position.get("data").unwrap_or(position))
        .filter_map(|position| {
            let size = number(position.get("size")?)?;
            if size <= 0.0 {
                return None;
            }
            let side = Side::parse(position.get("side")?.as_str()?)?;
            Some(crate::params! {
                "symbol" => symbol,
                "order_type" => "Market",
                "side" => side.opposite().as_str(),
                "qty" => size,
                "time_in_force" => "ImmediateOrCancel",
                "reduce_only" => true,
                "close_on_trigger" => true,
            })
        })
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
