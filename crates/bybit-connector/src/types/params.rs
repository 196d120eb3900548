/*
[INPUT]:  Caller-supplied request parameters (any field, unvalidated)
[OUTPUT]: Normalised parameter maps and their signing / query renderings
[POS]:    Data layer - open parameter mapping passed through to the transport
[UPDATE]: When the exchange changes how it canonicalises parameter values
*/

use serde_json::{Map, Number, Value};

/// Open request parameter mapping. Passed through verbatim apart from
/// numeric normalisation; validation is left to the exchange.
pub type Params = Map<String, Value>;

/// Build a [`Params`] map from `key => value` pairs.
///
/// ```
/// let params = bybit_connector::params! { "symbol" => "BTCUSDT", "qty" => 1 };
/// assert_eq!(params["symbol"], "BTCUSDT");
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Params::new();
        $( map.insert(::std::string::String::from($key), $crate::__private::serde_json::json!($value)); )+
        map
    }};
}

/// Replace integral floats with integers so `10.0` goes over the wire, and
/// into the signature, as `10`.
pub fn normalize(params: &mut Params) {
    for value in params.values_mut() {
        normalize_value(value);
    }
}

fn normalize_value(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if let Some(integral) = integral_float(number) {
                *value = Value::Number(integral);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_value),
        Value::Object(map) => map.values_mut().for_each(normalize_value),
        _ => {}
    }
}

fn integral_float(number: &Number) -> Option<Number> {
    if number.is_i64() || number.is_u64() {
        return None;
    }
    let float = number.as_f64()?;
    if float.fract() != 0.0 || !float.is_finite() || float.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Number::from(float as i64))
}

/// Render a parameter value the way the exchange does when it rebuilds the
/// signed string.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sorted `key=value` pairs, skipping nulls and the `sign` field itself.
pub fn sorted_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .filter(|(key, value)| key.as_str() != "sign" && !value.is_null())
        .map(|(key, value)| (key.clone(), render_value(value)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

/// Rename legacy keyword-safe parameter names to the names the API expects.
pub(crate) fn rename_key(params: &mut Params, from: &str, to: &str) {
    if let Some(value) = params.remove(from) {
        params.insert(to.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_integral_float() {
        let mut params = crate::params! { "qty" => 10.0, "price" => 0.5, "leverage" => 3 };
        normalize(&mut params);
        assert_eq!(params["qty"].to_string(), "10");
        assert_eq!(params["price"].to_string(), "0.5");
        assert_eq!(params["leverage"].to_string(), "3");
    }

    #[test]
    fn test_sorted_pairs_skip_null_and_sign() {
        let params = crate::params! {
            "symbol" => "BTCUSDT",
            "reduce_only" => false,
            "sign" => "deadbeef",
            "order_link_id" => Value::Null,
            "qty" => 1,
        };
        let pairs = sorted_pairs(&params);
        assert_eq!(
            pairs,
            vec![
                ("qty".to_string(), "1".to_string()),
                ("reduce_only".to_string(), "false".to_string()),
                ("symbol".to_string(), "BTCUSDT".to_string()),
            ]
        );
    }

    #[test]
    fn test_rename_key() {
        let mut params = crate::params! { "from_time" => 1_600_000_000 };
        rename_key(&mut params, "from_time", "from");
        assert_eq!(params.get("from"), Some(&json!(1_600_000_000)));
        assert!(!params.contains_key("from_time"));
    }
}
