/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Bybit connector crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, HmacSigner};

// Re-export commonly used types from http
pub use http::{
    BybitClient,
    BybitError,
    ClientConfig,
    DEFAULT_MAX_IN_PARALLEL,
    RequestSigner,
    Result,
    execute_bulk,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    BybitWebSocket,
    ConnectionState,
    StreamConfig,
    StreamProtocol,
    Subscription,
};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
