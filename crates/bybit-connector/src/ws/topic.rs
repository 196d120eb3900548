/*
[INPUT]:  Subscription descriptors (topic strings or spot filter objects)
[OUTPUT]: Topic keys, per-topic storage profiles and descriptor validation
[POS]:    WebSocket layer - topic identity shared by the session and the store
[UPDATE]: When Bybit adds a topic family or changes a natural key
*/

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::{BybitError, Result};
use crate::types::params::render_value;
use crate::types::PositionMode;

/// Topics that only exist on authenticated connections.
pub const PRIVATE_TOPICS: [&str; 8] = [
    "position",
    "execution",
    "order",
    "stop_order",
    "wallet",
    "outboundAccountInfo",
    "executionReport",
    "ticketInfo",
];

/// Feed topics whose data sets are drained by `fetch` unless overridden.
/// Keyed topics never drain by default: a later update needs the entry.
const CONSUME_ON_READ: [&str; 3] = ["trade", "execution", "ticketInfo"];

/// Topic families that need a suffix, with an example of the full form.
const INCOMPLETE_TOPICS: [(&str, &str); 4] = [
    ("trade", "trade.BTCUSD"),
    ("insurance", "insurance.BTC"),
    ("klineV2", "klineV2.5.BTCUSD"),
    ("candle", "candle.5.BTCUSDT"),
];

/// Spot push fields that vary between frames of the same subscription.
const VOLATILE_FIELDS: [&str; 8] = [
    "event", "symbolName", "data", "f", "sendTime", "shared", "code", "msg",
];

/// One subscription: a plain topic string, or a spot filter object such as
/// `{"topic":"trade","event":"sub","params":{"symbol":"BTCUSDT","binary":false}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subscription {
    Topic(String),
    Filter(Value),
}

impl Subscription {
    /// Key the data set for this subscription is stored under.
    pub fn key(&self) -> String {
        match self {
            Subscription::Topic(topic) => topic.clone(),
            Subscription::Filter(filter) => {
                spot_topic_key(filter).unwrap_or_else(|| canonical_json(filter))
            }
        }
    }

    /// Topic family, e.g. `orderBookL2_25` for `orderBookL2_25.BTCUSD`.
    pub fn name(&self) -> String {
        topic_name(&self.key()).to_string()
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Subscription::Topic(topic) if PRIVATE_TOPICS.contains(&topic.as_str()))
    }
}

impl From<&str> for Subscription {
    fn from(topic: &str) -> Self {
        Subscription::Topic(topic.to_string())
    }
}

impl From<String> for Subscription {
    fn from(topic: String) -> Self {
        Subscription::Topic(topic)
    }
}

impl From<Value> for Subscription {
    fn from(value: Value) -> Self {
        match value {
            Value::String(topic) => Subscription::Topic(topic),
            other => Subscription::Filter(other),
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Reject descriptor sets the exchange would refuse or that could never be
/// stored unambiguously.
pub fn validate_subscriptions(subscriptions: &[Subscription], authenticated: bool) -> Result<()> {
    if subscriptions.is_empty() {
        return Err(BybitError::Config("subscription list cannot be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for subscription in subscriptions {
        if let Subscription::Topic(topic) = subscription
            && let Some((_, example)) = INCOMPLETE_TOPICS.iter().find(|(bare, _)| *bare == topic.as_str())
        {
            return Err(BybitError::Config(format!(
                "'{topic}' requires a suffix, e.g. '{example}'"
            )));
        }
        if let Subscription::Filter(filter) = subscription
            && filter.get("topic").and_then(Value::as_str).is_none()
        {
            return Err(BybitError::Config(format!(
                "filter subscription {filter} has no topic"
            )));
        }
        if subscription.is_private() && !authenticated {
            return Err(BybitError::Config(format!(
                "private topic '{subscription}' requires credentials"
            )));
        }
        if !seen.insert(subscription.key()) {
            return Err(BybitError::Config(format!(
                "already subscribed to topic '{subscription}'"
            )));
        }
    }
    Ok(())
}

/// Family part of a topic key. Spot keys are JSON and carry it in `topic`.
pub fn topic_name(key: &str) -> &str {
    if key.starts_with('{') {
        return spot_name(key).unwrap_or(key);
    }
    key.split('.').next().unwrap_or(key)
}

fn spot_name(key: &str) -> Option<&str> {
    // Canonical keys render `"topic":"<name>"` once at the top level; params
    // are nested one level deeper and sorted before it.
    let start = key.rfind("\"topic\":\"")? + "\"topic\":\"".len();
    let end = key[start..].find('"')?;
    Some(&key[start..start + end])
}

/// Canonical key for a spot subscription or push: volatile fields stripped,
/// the kline interval folded into the topic name, keys sorted.
pub fn spot_topic_key(value: &Value) -> Option<String> {
    let mut object = value.as_object()?.clone();
    for field in VOLATILE_FIELDS {
        object.remove(field);
    }

    let mut kline_type = None;
    if let Some(Value::Object(params)) = object.get_mut("params") {
        params.remove("realtimeInterval");
        params.remove("symbolName");
        kline_type = params.remove("klineType");
        if let Some(binary) = params.get_mut("binary") {
            let enabled = render_value(binary) == "true";
            *binary = Value::Bool(enabled);
        }
    }
    if let Some(kline_type) = kline_type {
        let topic = object.get("topic").map(render_value).unwrap_or_default();
        object.insert(
            "topic".to_string(),
            Value::String(format!("{topic}_{}", render_value(&kline_type))),
        );
    }

    Some(canonical_json(&Value::Object(object)))
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body = keys
                .into_iter()
                .map(|key| format!("{}:{}", Value::String(key.clone()), canonical_json(&map[key])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{body}}}")
        }
        Value::Array(items) => {
            let body = items.iter().map(canonical_json).collect::<Vec<_>>().join(",");
            format!("[{body}]")
        }
        other => other.to_string(),
    }
}

/// How entries of a keyed topic are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    /// First present field among the aliases.
    Fields(&'static [&'static str]),
    /// `id`, else `price` + `side`.
    OrderBook,
    /// `symbol`, plus the side field in hedge mode.
    Position,
    /// `coin`, or a single record when absent.
    Wallet,
}

/// Storage shape of a topic's data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Keyed(KeySpec),
    /// Ordered, length-bounded sequence.
    Feed,
    /// Each push carries the full current state and replaces the previous one.
    Latest,
}

impl TopicKind {
    pub fn for_name(name: &str) -> Self {
        match name {
            n if n.starts_with("orderBook") => TopicKind::Keyed(KeySpec::OrderBook),
            "order" => TopicKind::Keyed(KeySpec::Fields(&["order_id", "orderId", "id"])),
            "stop_order" => TopicKind::Keyed(KeySpec::Fields(&[
                "stop_order_id",
                "stopOrderId",
                "order_id",
                "id",
            ])),
            "position" => TopicKind::Keyed(KeySpec::Position),
            "instrument_info" => TopicKind::Keyed(KeySpec::Fields(&["symbol"])),
            "wallet" => TopicKind::Keyed(KeySpec::Wallet),
            "executionReport" => TopicKind::Keyed(KeySpec::Fields(&["i", "orderId"])),
            "depth" | "mergedDepth" | "bookTicker" => TopicKind::Latest,
            _ => TopicKind::Feed,
        }
    }
}

/// Natural-key rules that depend on account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionKeying {
    pub mode: PositionMode,
    /// Field that tells the two legs apart in hedge mode.
    pub side_field: String,
}

impl Default for PositionKeying {
    fn default() -> Self {
        Self {
            mode: PositionMode::OneWay,
            side_field: "side".to_string(),
        }
    }
}

impl KeySpec {
    /// Natural key of `entry`, or `None` when the entry lacks the key fields.
    pub fn key_of(&self, entry: &Value, keying: &PositionKeying) -> Option<String> {
        let fields = entry.as_object()?;
        match self {
            KeySpec::Fields(aliases) => first_field(fields, aliases),
            KeySpec::OrderBook => first_field(fields, &["id"]).or_else(|| {
                let price = field(fields, "price")?;
                let side = field(fields, "side")?;
                Some(format!("{price}|{side}"))
            }),
            KeySpec::Position => {
                let symbol = field(fields, "symbol")?;
                match keying.mode {
                    PositionMode::OneWay => Some(symbol),
                    PositionMode::Hedge => {
                        let side = field(fields, &keying.side_field)?;
                        Some(format!("{symbol}|{side}"))
                    }
                }
            }
            KeySpec::Wallet => Some(field(fields, "coin").unwrap_or_default()),
        }
    }
}

fn field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .filter(|value| !value.is_null())
        .map(render_value)
}

fn first_field(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| field(fields, alias))
}

/// Whether `fetch` drains this topic unless the caller overrides it.
pub fn consumes_on_read_by_default(name: &str) -> bool {
    CONSUME_ON_READ.contains(&name)
}
