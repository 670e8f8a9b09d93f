//! Transfer service.
//!
//! Builds native and ERC-20 transfers for the connected account and hands
//! them to the wallet, which signs and broadcasts.

use std::sync::Arc;

use crate::{
    error::Result,
    ethereum::{
        constants::NATIVE_TRANSFER_GAS,
        contracts::erc20::encode_transfer,
        describe,
    },
    services::WalletSession,
    types::{to_hex_quantity, Account, SubmittedTransaction, TokenAmount, TransactionRequest},
};

/// Service for sending transfers through the wallet.
#[derive(Clone)]
pub struct TransferService {
    session: Arc<WalletSession>,
}

impl TransferService {
    /// Create a new transfer service.
    pub fn new(session: Arc<WalletSession>) -> Self {
        Self { session }
    }

    /// Send native currency to `to`.
    pub async fn transfer_native(
        &self,
        to: &Account,
        amount: &TokenAmount,
    ) -> Result<SubmittedTransaction> {
        let value = amount.positive_base_units()?;
        let from = self.session.require_account()?;

        tracing::info!(from = %from, to = %to, amount = %amount.amount(), "Sending native transfer");

        let tx = TransactionRequest {
            from: from.to_string(),
            to: to.to_string(),
            data: None,
            value: Some(to_hex_quantity(value)),
            gas: Some(format!("0x{NATIVE_TRANSFER_GAS:x}")),
        };
        self.submit(tx).await
    }

    /// Send `amount` of the ERC-20 `token` to `to`.
    pub async fn transfer_token(
        &self,
        token: &Account,
        to: &Account,
        amount: &TokenAmount,
    ) -> Result<SubmittedTransaction> {
        let value = amount.positive_base_units()?;
        let data = encode_transfer(to.as_str(), value)?;
        let from = self.session.require_account()?;

        tracing::info!(
            from = %from,
            token = %token,
            to = %to,
            amount = %amount.amount(),
            "Sending token transfer"
        );

        let tx = TransactionRequest {
            from: from.to_string(),
            to: token.to_string(),
            data: Some(data),
            value: None,
            gas: None,
        };
        self.submit(tx).await
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<SubmittedTransaction> {
        let provider = self.session.provider();
        let prompt = self.session.begin_prompt("transaction")?;
        let tx_hash = provider.send_transaction(&tx).await?;
        drop(prompt);

        let explorer_url = match provider.chain_id().await {
            Ok(chain_id) => describe(chain_id).explorer_tx_url(&tx_hash),
            Err(e) => {
                tracing::debug!(error = %e, "Could not resolve network for explorer link");
                None
            }
        };

        Ok(SubmittedTransaction { tx_hash, explorer_url, transaction: tx })
    }
}
