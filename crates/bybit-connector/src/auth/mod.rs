/*
[INPUT]:  API key and secret
[OUTPUT]: Shared credentials and HMAC signatures
[POS]:    Auth layer - handles Bybit API key authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod credentials;
pub mod signer;

pub use credentials::Credentials;
pub use signer::HmacSigner;
