//! Balance query service.

use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    ethereum::{
        contracts::erc20::{decode_uint, encode_balance_of},
        describe,
    },
    services::WalletSession,
    types::{format_units, Account, BalanceInfo, TokenInfo},
};

/// Service for querying balances of the connected account.
#[derive(Clone)]
pub struct BalanceService {
    session: Arc<WalletSession>,
}

impl BalanceService {
    /// Create a new balance service.
    pub fn new(session: Arc<WalletSession>) -> Self {
        Self { session }
    }

    /// Native balance of the connected account, labeled with the network the
    /// wallet is on.
    pub async fn native_balance(&self) -> Result<BalanceInfo> {
        let account = self.session.require_account()?;
        let provider = self.session.provider();

        tracing::debug!(address = %account, "Querying native balance");

        let chain_id = provider.chain_id().await?;
        let balance = provider.get_balance(&account).await?;
        let network = describe(chain_id);
        let currency = &network.native_currency;

        Ok(BalanceInfo {
            address: account.to_string(),
            chain_id: chain_id.to_string(),
            token: TokenInfo::native(&currency.symbol, currency.decimals),
            balance: format_units(balance, currency.decimals),
            balance_raw: balance.to_string(),
            network: network.name,
        })
    }

    /// ERC-20 balance of the connected account.
    ///
    /// `symbol` and `decimals` describe the token; they are not read from the
    /// contract.
    pub async fn token_balance(
        &self,
        token: &Account,
        symbol: &str,
        decimals: u8,
    ) -> Result<BalanceInfo> {
        let account = self.session.require_account()?;
        let provider = self.session.provider();

        tracing::debug!(address = %account, token = %token, "Querying ERC20 balance");

        let calldata = encode_balance_of(account.as_str())?;
        let chain_id = provider.chain_id().await?;
        let result = provider.call(token, &calldata).await?;
        let balance = decode_uint(&result)
            .map_err(|e| AppError::malformed(format!("balanceOf returned {result}: {e}")))?;

        Ok(BalanceInfo {
            address: account.to_string(),
            chain_id: chain_id.to_string(),
            network: describe(chain_id).name,
            token: TokenInfo::erc20(token, symbol, decimals),
            balance: format_units(balance, decimals),
            balance_raw: balance.to_string(),
        })
    }
}
