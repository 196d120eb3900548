/*
[INPUT]:  Raw WebSocket text frames (futures or spot protocol)
[OUTPUT]: Classified frames: acknowledgements, pongs and data events
[POS]:    WebSocket layer - wire format decoding
[UPDATE]: When Bybit changes a frame shape or adds an acknowledgement
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::params::render_value;
use crate::ws::topic::spot_topic_key;

/// Wire dialect of a stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamProtocol {
    /// Derivatives streams: `op` requests, `topic` pushes.
    #[default]
    Futures,
    /// Spot streams: filter-object subscriptions, `e`-tagged private arrays.
    Spot,
}

/// Merge operation carried by a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Snapshot,
    Insert,
    Update,
    Delete,
    /// Untagged push: merge into an existing entry or insert it.
    Upsert,
}

/// One merge step for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub topic: String,
    pub action: Action,
    pub entries: Vec<Value>,
}

impl StreamEvent {
    fn new(topic: impl Into<String>, action: Action, entries: Vec<Value>) -> Self {
        Self {
            topic: topic.into(),
            action,
            entries,
        }
    }
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    AuthAck { success: bool, message: String },
    SubscribeAck {
        success: bool,
        topics: Vec<String>,
        message: String,
    },
    Pong,
    /// Server-initiated ping carrying a timestamp (spot)
    Ping(Value),
    /// Events in the order they must be applied
    Data(Vec<StreamEvent>),
    Other,
}

/// Decode one text frame.
pub fn parse_frame(text: &str, protocol: StreamProtocol) -> serde_json::Result<Frame> {
    let value: Value = serde_json::from_str(text)?;
    Ok(match protocol {
        StreamProtocol::Futures => parse_futures(value),
        StreamProtocol::Spot => parse_spot(value),
    })
}

fn parse_futures(value: Value) -> Frame {
    if let Some(request) = value.get("request") {
        let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
        let message = text_field(&value, "ret_msg");
        return match request.get("op").and_then(Value::as_str) {
            Some("auth") => Frame::AuthAck { success, message },
            Some("subscribe") => Frame::SubscribeAck {
                success,
                topics: request
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|args| args.iter().map(render_value).collect())
                    .unwrap_or_default(),
                message,
            },
            Some("ping") => Frame::Pong,
            _ => Frame::Other,
        };
    }

    if value.get("ret_msg").and_then(Value::as_str) == Some("pong")
        || value.get("op").and_then(Value::as_str) == Some("pong")
    {
        return Frame::Pong;
    }

    let Some(topic) = value.get("topic").and_then(Value::as_str) else {
        return Frame::Other;
    };
    let data = value.get("data").cloned().unwrap_or(Value::Null);

    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        return match kind {
            "snapshot" => Frame::Data(vec![StreamEvent::new(
                topic,
                Action::Snapshot,
                snapshot_entries(data),
            )]),
            "delta" => Frame::Data(delta_events(topic, &data)),
            _ => Frame::Other,
        };
    }

    let action = match value.get("action").and_then(Value::as_str) {
        Some("partial") | Some("snapshot") => Action::Snapshot,
        Some("insert") => Action::Insert,
        Some("update") => Action::Update,
        Some("delete") => Action::Delete,
        _ => Action::Upsert,
    };
    Frame::Data(vec![StreamEvent::new(topic, action, entries(data))])
}

fn parse_spot(value: Value) -> Frame {
    match value {
        Value::Array(items) => Frame::Data(
            items
                .into_iter()
                .filter_map(|item| {
                    let tag = item.get("e").and_then(Value::as_str)?.to_string();
                    Some(StreamEvent::new(tag, Action::Upsert, vec![item]))
                })
                .collect(),
        ),
        Value::Object(ref object) => {
            if object.contains_key("pong") {
                return Frame::Pong;
            }
            if let Some(ts) = object.get("ping") {
                return Frame::Ping(ts.clone());
            }
            if let Some(auth) = object.get("auth") {
                return Frame::AuthAck {
                    success: auth.as_str() == Some("success"),
                    message: render_value(auth),
                };
            }
            let is_ack = object.get("event").and_then(Value::as_str) == Some("sub")
                || (object.contains_key("code") && !object.contains_key("data"));
            if is_ack {
                let code = object.get("code").map(render_value).unwrap_or_default();
                let success = object.get("success").and_then(Value::as_bool) == Some(true)
                    || code == "0";
                return Frame::SubscribeAck {
                    success,
                    topics: spot_topic_key(&value).into_iter().collect(),
                    message: text_field(&value, "msg"),
                };
            }
            if object.contains_key("topic") && object.contains_key("data") {
                let Some(key) = spot_topic_key(&value) else {
                    return Frame::Other;
                };
                let first = object.get("f").and_then(Value::as_bool).unwrap_or(false);
                let action = if first { Action::Snapshot } else { Action::Insert };
                let data = object.get("data").cloned().unwrap_or(Value::Null);
                return Frame::Data(vec![StreamEvent::new(key, action, entries(data))]);
            }
            Frame::Other
        }
        _ => Frame::Other,
    }
}

/// Delta frames apply deletes, then updates, then inserts.
fn delta_events(topic: &str, data: &Value) -> Vec<StreamEvent> {
    [
        ("delete", Action::Delete),
        ("update", Action::Update),
        ("insert", Action::Insert),
    ]
    .into_iter()
    .filter_map(|(field, action)| {
        let items = data.get(field)?.as_array()?;
        (!items.is_empty()).then(|| StreamEvent::new(topic, action, items.clone()))
    })
    .collect()
}

fn snapshot_entries(data: Value) -> Vec<Value> {
    match data {
        Value::Object(mut object) => match object.remove("order_book") {
            Some(Value::Array(book)) => book,
            Some(other) => vec![other],
            None => vec![Value::Object(object)],
        },
        other => entries(other),
    }
}

fn entries(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn text_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn futures(value: Value) -> Frame {
        parse_frame(&value.to_string(), StreamProtocol::Futures).unwrap()
    }

    fn spot(value: Value) -> Frame {
        parse_frame(&value.to_string(), StreamProtocol::Spot).unwrap()
    }

    #[test]
    fn test_futures_acks() {
        let auth = futures(json!({
            "success": true, "ret_msg": "", "conn_id": "c1",
            "request": {"op": "auth", "args": ["key", 1, "sig"]}
        }));
        assert_eq!(auth, Frame::AuthAck { success: true, message: String::new() });

        let sub = futures(json!({
            "success": false, "ret_msg": "error:handler not found,topic:foo",
            "request": {"op": "subscribe", "args": ["foo"]}
        }));
        let Frame::SubscribeAck { success, topics, .. } = sub else {
            panic!("expected subscribe ack");
        };
        assert!(!success);
        assert_eq!(topics, vec!["foo".to_string()]);

        let pong = futures(json!({
            "success": true, "ret_msg": "pong", "request": {"op": "ping", "args": null}
        }));
        assert_eq!(pong, Frame::Pong);
    }

    #[test]
    fn test_futures_delta_order() {
        let frame = futures(json!({
            "topic": "orderBookL2_25.BTCUSD",
            "type": "delta",
            "data": {
                "delete": [{"id": 1}],
                "update": [{"id": 2, "size": 5}],
                "insert": [{"id": 3, "size": 1}],
                "transactTimeE6": 0
            }
        }));
        let Frame::Data(events) = frame else { panic!("expected data") };
        let actions: Vec<Action> = events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![Action::Delete, Action::Update, Action::Insert]);
    }

    #[test]
    fn test_futures_snapshot_order_book_shape() {
        let frame = futures(json!({
            "topic": "orderBook_200.100ms.BTCUSDT",
            "type": "snapshot",
            "data": {"order_book": [{"id": 1}, {"id": 2}]}
        }));
        let Frame::Data(events) = frame else { panic!("expected data") };
        assert_eq!(events[0].action, Action::Snapshot);
        assert_eq!(events[0].entries.len(), 2);
    }

    #[test]
    fn test_private_actions() {
        let partial = futures(json!({"topic": "order", "action": "partial", "data": [{"id": 1}]}));
        let untagged = futures(json!({"topic": "position", "data": [{"symbol": "BTCUSD"}]}));
        let Frame::Data(partial) = partial else { panic!() };
        let Frame::Data(untagged) = untagged else { panic!() };
        assert_eq!(partial[0].action, Action::Snapshot);
        assert_eq!(untagged[0].action, Action::Upsert);
    }

    #[test]
    fn test_spot_frames() {
        assert_eq!(spot(json!({"pong": 1_700_000_000_000_i64})), Frame::Pong);
        assert_eq!(
            spot(json!({"auth": "success", "userId": 1})),
            Frame::AuthAck { success: true, message: "success".to_string() }
        );

        let ack = spot(json!({
            "topic": "trade", "event": "sub", "params": {"symbol": "BTCUSDT", "binary": "false"},
            "code": "0", "msg": "Success"
        }));
        assert!(matches!(ack, Frame::SubscribeAck { success: true, ref topics, .. } if topics.len() == 1));

        let private = spot(json!([
            {"e": "executionReport", "i": "100", "X": "NEW"},
            {"e": "ticketInfo", "q": "0.1"}
        ]));
        let Frame::Data(events) = private else { panic!() };
        assert_eq!(events[0].topic, "executionReport");
        assert_eq!(events[1].topic, "ticketInfo");
    }
}
