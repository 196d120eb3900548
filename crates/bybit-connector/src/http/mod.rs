/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: Parsed JSON responses from the REST API
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoint groups or changing client behavior
*/

pub mod account;
pub mod bulk;
pub mod client;
pub mod error;
pub mod market;
pub mod position;
pub(crate) mod routes;
pub mod signature;
pub mod trade;

pub use bulk::{DEFAULT_MAX_IN_PARALLEL, execute_bulk};
pub use client::{BybitClient, ClientConfig, RETRY_CODES};
pub use error::{BybitError, Result};
pub use signature::RequestSigner;
