//! Swap quote client.
//!
//! Prices and builds native-currency swaps through a 1inch-compatible
//! aggregator API. Aggregator responses are untrusted: anything missing or
//! malformed fails the request instead of producing a transaction.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::Config,
    error::{AppError, Result},
    ethereum::{constants::NATIVE_TOKEN_ADDRESS, describe},
    services::WalletSession,
    types::{
        parse_base_units, to_hex_quantity, Account, ChainId, Quote, QuotedToken,
        SubmittedTransaction, TokenAmount, TransactionRequest,
    },
};

/// Highest accepted slippage, in basis points (50%).
pub const MAX_SLIPPAGE_BPS: u32 = 5_000;

/// Client for the aggregator's quote and swap endpoints.
pub struct SwapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: ChainId,
    quote_ttl: Duration,
    session: Arc<WalletSession>,
    latest: AtomicU64,
}

impl SwapClient {
    /// Create a new swap client bound to the shared session.
    pub fn new(config: &Config, session: Arc<WalletSession>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.aggregator_url.trim_end_matches('/').to_string(),
            api_key: config.aggregator_api_key.clone(),
            chain_id: ChainId::new(config.aggregator_chain_id),
            quote_ttl: config.quote_ttl,
            session,
            latest: AtomicU64::new(0),
        })
    }

    /// Chain the aggregator is queried for.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// How long a quote stays usable.
    pub fn quote_ttl(&self) -> Duration {
        self.quote_ttl
    }

    /// Whether `quote` is still within its lifetime.
    pub fn is_fresh(&self, quote: &Quote) -> bool {
        quote.issued_at.elapsed() <= self.quote_ttl
    }

    /// Quote selling `sell` of the native currency for `destination`.
    ///
    /// No wallet connection is needed. A newer quote request, or losing or
    /// switching the connected account while this one is in flight, discards
    /// the result with [`AppError::Superseded`].
    pub async fn get_quote(&self, sell: &TokenAmount, destination: &str) -> Result<Quote> {
        let sell_amount = sell.positive_base_units()?;
        let dst = destination_token(destination)?;
        let account = self.session.account();

        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(sequence, dst = %dst, amount = %sell.amount(), "Requesting swap quote");

        let body = self
            .get_json(
                "quote",
                &[
                    ("src", NATIVE_TOKEN_ADDRESS.to_string()),
                    ("dst", dst.to_string()),
                    ("amount", sell_amount.to_string()),
                    ("includeTokensInfo", "true".to_string()),
                    ("includeGas", "true".to_string()),
                ],
            )
            .await;

        if self.latest.load(Ordering::SeqCst) != sequence {
            tracing::debug!(sequence, "Discarding quote superseded by a newer request");
            return Err(AppError::Superseded("a newer quote was requested".into()));
        }
        if account.is_some() && self.session.account() != account {
            tracing::info!(sequence, "Discarding quote: wallet account changed");
            return Err(AppError::Superseded("wallet account changed".into()));
        }

        let parsed = body.and_then(|body| parse_quote_response(&body)).inspect_err(|e| {
            tracing::warn!(error = %e, "Quote request failed");
        })?;

        tracing::info!(
            sequence,
            dst = %dst,
            to_amount = %parsed.to_amount,
            symbol = %parsed.to_token.symbol,
            "Swap quote received"
        );

        Ok(Quote {
            src: Account::parse(NATIVE_TOKEN_ADDRESS)?,
            dst,
            sell_amount,
            to_amount: parsed.to_amount,
            estimated_gas: parsed.estimated_gas,
            to_token: parsed.to_token,
            sequence,
            issued_at: Instant::now(),
        })
    }

    /// Build the swap transaction for a previously obtained quote.
    ///
    /// The quote must be fresh and must describe the same sell amount and
    /// destination. `slippage_bps` is in basis points (100 = 1%).
    pub async fn build_swap_transaction(
        &self,
        quote: &Quote,
        sell: &TokenAmount,
        destination: &str,
        sender: &Account,
        slippage_bps: u32,
    ) -> Result<TransactionRequest> {
        if !self.is_fresh(quote) {
            return Err(AppError::QuoteExpired);
        }
        let slippage = slippage_percent(slippage_bps)?;
        let sell_amount = sell.positive_base_units()?;
        let dst = destination_token(destination)?;
        if sell_amount != quote.sell_amount || dst != quote.dst {
            return Err(AppError::InvalidInput(
                "The quote does not match this amount and token. Please get a new quote.".into(),
            ));
        }

        tracing::debug!(dst = %dst, from = %sender, slippage = %slippage, "Requesting swap data");

        let body = self
            .get_json(
                "swap",
                &[
                    ("src", NATIVE_TOKEN_ADDRESS.to_string()),
                    ("dst", dst.to_string()),
                    ("amount", sell_amount.to_string()),
                    ("from", sender.to_string()),
                    ("slippage", slippage),
                ],
            )
            .await?;

        parse_swap_response(&body, sender).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected swap response");
        })
    }

    /// Hand a swap transaction to the wallet.
    ///
    /// The wallet must be on the chain the swap was quoted for.
    pub async fn submit(&self, tx: TransactionRequest) -> Result<SubmittedTransaction> {
        let provider = self.session.provider();
        let _prompt = self.session.begin_prompt("transaction")?;
        let wallet_chain = provider.chain_id().await?;
        if wallet_chain != self.chain_id {
            return Err(AppError::InvalidInput(format!(
                "Your wallet is on {}, but swaps are quoted on {}. Please switch networks first.",
                describe(wallet_chain).name,
                describe(self.chain_id).name
            )));
        }

        let tx_hash = provider.send_transaction(&tx).await?;
        Ok(SubmittedTransaction {
            explorer_url: describe(wallet_chain).explorer_tx_url(&tx_hash),
            tx_hash,
            transaction: tx,
        })
    }

    /// Quote, build and submit a purchase for the connected account.
    pub async fn buy(
        &self,
        sell: &TokenAmount,
        destination: &str,
        slippage_bps: u32,
    ) -> Result<SubmittedTransaction> {
        slippage_percent(slippage_bps)?;
        self.session.require_account()?;
        let quote = self.get_quote(sell, destination).await?;
        self.buy_with_quote(&quote, sell, destination, slippage_bps).await
    }

    /// Build and submit a purchase from an existing quote.
    pub async fn buy_with_quote(
        &self,
        quote: &Quote,
        sell: &TokenAmount,
        destination: &str,
        slippage_bps: u32,
    ) -> Result<SubmittedTransaction> {
        let sender = self.session.require_account()?;
        let tx = self.build_swap_transaction(quote, sell, destination, &sender, slippage_bps).await?;

        if self.session.account().as_ref() != Some(&sender) {
            return Err(AppError::Superseded("wallet account changed".into()));
        }

        tracing::info!(from = %sender, to = %tx.to, dst = %quote.dst, "Submitting swap");
        self.submit(tx).await
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}/{endpoint}", self.base_url, self.chain_id.as_u64());

        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("description")
                        .or_else(|| body.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            return Err(AppError::Upstream(format!("Aggregator returned {status} {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Aggregator returned an invalid body: {e}")))
    }
}

impl std::fmt::Debug for SwapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapClient")
            .field("base_url", &self.base_url)
            .field("chain_id", &self.chain_id)
            .field("quote_ttl", &self.quote_ttl)
            .finish()
    }
}

fn destination_token(destination: &str) -> Result<Account> {
    let dst = Account::parse(destination)?;
    if dst.as_str() == NATIVE_TOKEN_ADDRESS {
        return Err(AppError::InvalidInput("Cannot swap ETH for itself".into()));
    }
    Ok(dst)
}

/// Basis points as the percentage string the aggregator expects.
fn slippage_percent(bps: u32) -> Result<String> {
    if bps > MAX_SLIPPAGE_BPS {
        return Err(AppError::InvalidInput(format!(
            "Slippage {bps}bps exceeds the maximum of {MAX_SLIPPAGE_BPS}bps"
        )));
    }
    Ok(Decimal::new(i64::from(bps), 2).normalize().to_string())
}

#[derive(Debug)]
struct ParsedQuote {
    to_amount: U256,
    estimated_gas: u64,
    to_token: QuotedToken,
}

fn upstream(message: impl Into<String>) -> AppError {
    AppError::Upstream(message.into())
}

/// Integer carried as a JSON number or a decimal/hex string.
fn integer_field(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) if !s.trim().is_empty() && s.trim() != "0x" => {
            parse_base_units(s.trim()).ok()
        }
        _ => None,
    }
}

fn parse_quote_response(body: &Value) -> Result<ParsedQuote> {
    let to_amount = body
        .get("toAmount")
        .or_else(|| body.get("dstAmount"))
        .ok_or_else(|| upstream("Quote is missing toAmount"))?;
    let to_amount =
        integer_field(to_amount).ok_or_else(|| upstream(format!("Invalid toAmount: {to_amount}")))?;

    let gas = body
        .get("estimatedGas")
        .or_else(|| body.get("gas"))
        .ok_or_else(|| upstream("Quote is missing estimatedGas"))?;
    let estimated_gas = integer_field(gas)
        .and_then(|g| u64::try_from(g).ok())
        .ok_or_else(|| upstream(format!("Invalid estimatedGas: {gas}")))?;

    let token = body.get("toToken").ok_or_else(|| upstream("Quote is missing toToken"))?;
    let symbol = token
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| upstream("Quote is missing toToken.symbol"))?;
    let decimals = token
        .get("decimals")
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| upstream("Quote is missing toToken.decimals"))?;

    Ok(ParsedQuote {
        to_amount,
        estimated_gas,
        to_token: QuotedToken { symbol: symbol.to_string(), decimals },
    })
}

fn parse_swap_response(body: &Value, sender: &Account) -> Result<TransactionRequest> {
    let tx = body
        .get("tx")
        .filter(|tx| tx.is_object())
        .ok_or_else(|| upstream("Swap response is missing tx"))?;

    if let Some(from) = tx.get("from") {
        let from = from
            .as_str()
            .and_then(|s| Account::parse(s).ok())
            .ok_or_else(|| upstream(format!("Invalid tx.from: {from}")))?;
        if from != *sender {
            return Err(upstream(format!("tx.from {from} does not match the sender {sender}")));
        }
    }

    let to = tx
        .get("to")
        .and_then(Value::as_str)
        .and_then(|s| Account::parse(s).ok())
        .ok_or_else(|| upstream("Swap response has no valid tx.to"))?;

    let data = tx
        .get("data")
        .and_then(Value::as_str)
        .filter(|d| {
            d.strip_prefix("0x")
                .is_some_and(|body| !body.is_empty() && body.bytes().all(|b| b.is_ascii_hexdigit()))
        })
        .ok_or_else(|| upstream("Swap response has no valid tx.data"))?;

    let value = tx
        .get("value")
        .and_then(integer_field)
        .ok_or_else(|| upstream("Swap response has no valid tx.value"))?;

    let gas = tx
        .get("gas")
        .and_then(integer_field)
        .filter(|g| !g.is_zero())
        .ok_or_else(|| upstream("Swap response has no valid tx.gas"))?;

    Ok(TransactionRequest {
        from: sender.to_string(),
        to: to.to_string(),
        data: Some(data.to_ascii_lowercase()),
        value: Some(to_hex_quantity(value)),
        gas: Some(to_hex_quantity(gas)),
    })
}
