/*
[INPUT]:  Request parameters, timestamps and the HMAC signer
[OUTPUT]: Signed parameter maps and WebSocket auth frames
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or parameter canonicalisation
*/

use serde_json::Value;

use crate::auth::Credentials;
use crate::types::{params, Params};

/// Signs request parameters and WebSocket auth payloads
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    /// Create a new request signer with the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    /// Canonical string that gets signed: sorted `k=v` joined by `&`
    pub fn canonical_query(params: &Params) -> String {
        params::sorted_pairs(params)
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Signature over the given parameter set (excluding any `sign` entry)
    pub fn signature(&self, params: &Params) -> String {
        self.credentials.signer().sign(&Self::canonical_query(params))
    }

    /// Inject `api_key`, `timestamp`, `recv_window` and finally `sign`.
    pub fn sign_params(&self, params: &mut Params, timestamp: i64, recv_window: u64) {
        params.remove("sign");
        params.insert(
            "api_key".to_string(),
            Value::String(self.credentials.api_key().to_string()),
        );
        params.insert("timestamp".to_string(), Value::from(timestamp));
        params.insert("recv_window".to_string(), Value::from(recv_window));
        let signature = self.signature(params);
        params.insert("sign".to_string(), Value::String(signature));
    }

    /// Signature for the WebSocket auth frame: `GET/realtime{expires}`
    pub fn ws_signature(&self, expires: i64) -> String {
        self.credentials
            .signer()
            .sign(&format!("GET/realtime{expires}"))
    }

    /// Full `{"op":"auth"}` frame for the given expiry
    pub fn ws_auth_frame(&self, expires: i64) -> Value {
        serde_json::json!({
            "op": "auth",
            "args": [self.credentials.api_key(), expires, self.ws_signature(expires)],
        })
    }
}
