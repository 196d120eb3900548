/*
[INPUT]:  Account query parameters (signed with the account credentials)
[OUTPUT]: Wallet balances, fund records and API key information
[POS]:    HTTP layer - account and wallet endpoints (require auth)
[UPDATE]: When adding account endpoints
*/

use serde_json::Value;

use crate::http::routes;
use crate::http::{BybitClient, Result};
use crate::types::Params;

impl BybitClient {
    /// Wallet balance; spot accounts use the spot account endpoint
    pub async fn get_wallet_balance(&self, params: Params) -> Result<Value> {
        self.call(&routes::GET_WALLET_BALANCE, params).await
    }

    pub async fn wallet_fund_records(&self, params: Params) -> Result<Value> {
        self.call(&routes::WALLET_FUND_RECORDS, params).await
    }

    pub async fn withdraw_records(&self, params: Params) -> Result<Value> {
        self.call(&routes::WITHDRAW_RECORDS, params).await
    }

    pub async fn asset_exchange_records(&self, params: Params) -> Result<Value> {
        self.call(&routes::ASSET_EXCHANGE_RECORDS, params).await
    }

    /// Permissions and expiry of the current API key
    pub async fn api_key_info(&self) -> Result<Value> {
        self.call(&routes::API_KEY_INFO, Params::new()).await
    }

    /// Liquidity contribution points
    pub async fn lcp_info(&self, params: Params) -> Result<Value> {
        self.call(&routes::LCP_INFO, params).await
    }
}
