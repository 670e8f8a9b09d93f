//! Provider adapter.
//!
//! Typed access to the host wallet. A missing host is a normal state:
//! [`ProviderAdapter::is_available`] reports it, and every other method fails
//! with [`AppError::ProviderUnavailable`].

use std::sync::Arc;

use alloy::primitives::U256;
use serde_json::{json, Value};

use super::{
    host::{HostWallet, ListenerId, RpcRequest},
    networks::NetworkDescriptor,
};
use crate::{
    error::{AppError, Result},
    types::{parse_base_units, Account, ChainId, TransactionRequest},
};

/// Active `accountsChanged` subscription. Release it with
/// [`ProviderAdapter::unsubscribe`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a subscription without unsubscribing leaks the listener"]
pub struct Subscription {
    id: ListenerId,
}

/// Wrapper around the host wallet capability.
#[derive(Clone, Default)]
pub struct ProviderAdapter {
    host: Option<Arc<dyn HostWallet>>,
}

impl ProviderAdapter {
    /// Adapter backed by a host wallet.
    pub fn new(host: Arc<dyn HostWallet>) -> Self {
        Self { host: Some(host) }
    }

    /// Adapter with no wallet present.
    pub fn unavailable() -> Self {
        Self { host: None }
    }

    /// Whether a wallet is present.
    pub fn is_available(&self) -> bool {
        self.host.is_some()
    }

    fn host(&self) -> Result<&Arc<dyn HostWallet>> {
        self.host.as_ref().ok_or(AppError::ProviderUnavailable)
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let host = self.host()?;
        host.request(RpcRequest::with_params(method, params))
            .await
            .map_err(|e| AppError::from_provider(e.code, e.message))
    }

    /// Ask the user to expose their accounts (`eth_requestAccounts`).
    pub async fn request_accounts(&self) -> Result<Vec<Account>> {
        let value = self.request("eth_requestAccounts", vec![]).await?;
        parse_accounts(&value)
    }

    /// Accounts already exposed to us, without prompting (`eth_accounts`).
    pub async fn current_accounts(&self) -> Result<Vec<Account>> {
        let value = self.request("eth_accounts", vec![]).await?;
        parse_accounts(&value)
    }

    /// The wallet's active chain.
    pub async fn chain_id(&self) -> Result<ChainId> {
        let value = self.request("eth_chainId", vec![]).await?;
        let raw = value.as_str().ok_or_else(|| AppError::malformed("eth_chainId is not a string"))?;
        ChainId::parse(raw).map_err(|_| AppError::malformed(format!("Invalid chain ID: {raw}")))
    }

    /// Native balance of `account` at the latest block, in base units.
    pub async fn get_balance(&self, account: &Account) -> Result<U256> {
        let value = self.request("eth_getBalance", vec![json!(account), json!("latest")]).await?;
        parse_quantity(&value, "eth_getBalance")
    }

    /// Read-only contract call at the latest block, returning the raw hex.
    pub async fn call(&self, to: &Account, data: &str) -> Result<String> {
        let value = self
            .request("eth_call", vec![json!({ "to": to, "data": data }), json!("latest")])
            .await?;
        value
            .as_str()
            .filter(|s| is_hex(s))
            .map(str::to_string)
            .ok_or_else(|| AppError::malformed("eth_call result is not hex"))
    }

    /// Hand a transaction to the wallet for signing and broadcast.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let value = self.request("eth_sendTransaction", vec![serde_json::to_value(tx)?]).await?;
        let hash = value
            .as_str()
            .filter(|s| is_hex(s) && s.len() > 2)
            .ok_or_else(|| AppError::malformed("eth_sendTransaction did not return a hash"))?;

        tracing::info!(tx_hash = %hash, to = %tx.to, "Transaction submitted");
        Ok(hash.to_string())
    }

    /// Ask the wallet to switch networks.
    ///
    /// Fails with [`AppError::UnknownChain`] when the wallet does not know the
    /// chain.
    pub async fn switch_chain(&self, chain_id: ChainId) -> Result<()> {
        self.request("wallet_switchEthereumChain", vec![json!({ "chainId": chain_id })]).await?;
        Ok(())
    }

    /// Ask the wallet to add a network.
    pub async fn add_chain(&self, network: &NetworkDescriptor) -> Result<()> {
        self.request("wallet_addEthereumChain", vec![network.add_chain_params()]).await?;
        Ok(())
    }

    /// Subscribe to account changes. Entries that are not valid addresses are
    /// dropped before the handler sees the list.
    pub fn subscribe_accounts_changed(
        &self,
        handler: impl Fn(Vec<Account>) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let host = self.host()?;
        let id = host.on_accounts_changed(Arc::new(move |raw: Vec<String>| {
            let accounts = raw
                .iter()
                .filter_map(|a| match Account::parse(a) {
                    Ok(account) => Some(account),
                    Err(_) => {
                        tracing::warn!(account = %a, "Ignoring malformed account from wallet");
                        None
                    }
                })
                .collect();
            handler(accounts);
        }));
        Ok(Subscription { id })
    }

    /// Release a subscription.
    pub fn unsubscribe(&self, subscription: Subscription) {
        if let Some(host) = &self.host {
            host.remove_listener(subscription.id);
        }
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter").field("available", &self.is_available()).finish()
    }
}

fn is_hex(s: &str) -> bool {
    s.strip_prefix("0x").is_some_and(|body| body.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn parse_accounts(value: &Value) -> Result<Vec<Account>> {
    let entries =
        value.as_array().ok_or_else(|| AppError::malformed("Account list is not an array"))?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .and_then(|s| Account::parse(s).ok())
                .ok_or_else(|| AppError::malformed(format!("Invalid account: {entry}")))
        })
        .collect()
}

fn parse_quantity(value: &Value, method: &str) -> Result<U256> {
    value
        .as_str()
        .filter(|s| is_hex(s))
        .and_then(|s| parse_base_units(s).ok())
        .ok_or_else(|| AppError::malformed(format!("{method} did not return a hex quantity")))
}
