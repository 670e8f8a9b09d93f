//! MCP server implementation.

use std::sync::Arc;

use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::AppError,
    ethereum::{
        constants::{find_token, token_list, TokenListEntry},
        describe,
        networks::by_key,
        NetworkDescriptor, ProviderAdapter,
    },
    services::{
        BalanceService, PriceService, SwapClient, TransferService, WalletSession, MAX_SLIPPAGE_BPS,
    },
    types::{Account, ChainId, Quote, TokenAmount, TokenInfo},
};

/// Gold token wallet MCP server.
///
/// Each tool is one UI action of the token site: wallet connection, network
/// display and switching, balances, prices, quotes, purchases and transfers.
#[derive(Clone)]
pub struct GoldTokenServer {
    session: Arc<WalletSession>,
    balance_service: BalanceService,
    transfer_service: TransferService,
    price_service: PriceService,
    swap_client: Arc<SwapClient>,
    last_quote: Arc<Mutex<Option<Quote>>>,
    default_slippage_bps: u32,
    tool_router: ToolRouter<Self>,
}

impl GoldTokenServer {
    /// Create the server, mounting a wallet session on `provider`.
    pub async fn new(config: &Config, provider: ProviderAdapter) -> Result<Self, AppError> {
        let session = Arc::new(WalletSession::mount(provider).await);
        Self::with_session(config, session)
    }

    /// Create the server around an existing session.
    pub fn with_session(config: &Config, session: Arc<WalletSession>) -> Result<Self, AppError> {
        tracing::info!("Initializing gold token wallet server");

        if config.default_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(AppError::Config(format!(
                "DEFAULT_SLIPPAGE_BPS must be at most {MAX_SLIPPAGE_BPS}"
            )));
        }

        let swap_client = Arc::new(SwapClient::new(config, session.clone())?);

        Ok(Self {
            balance_service: BalanceService::new(session.clone()),
            transfer_service: TransferService::new(session.clone()),
            price_service: PriceService::new(config)?,
            swap_client,
            session,
            last_quote: Arc::new(Mutex::new(None)),
            default_slippage_bps: config.default_slippage_bps,
            tool_router: Self::tool_router(),
        })
    }

    /// The shared wallet session.
    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    async fn wallet_chain(&self) -> Result<ChainId, AppError> {
        self.session.provider().chain_id().await
    }
}

/// Input parameters for the switch_network tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct SwitchNetworkInput {
    /// Network key ("mainnet", "goerli", "sepolia", "polygon", ...) or chain ID ("0x89", "137").
    pub network: String,
}

/// Input parameters for the get_token_balance tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct GetTokenBalanceInput {
    /// Token symbol from the token list (e.g., "USDT") or contract address (0x...).
    pub token: String,
    /// Token decimals. Required for contract addresses that are not in the token list.
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// Input parameters for the get_token_price tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct GetTokenPriceInput {
    /// Token symbol (e.g., "USDC") or Ethereum mainnet contract address.
    pub token: String,
}

/// Input parameters for the list_tokens tool.
#[derive(Debug, Clone, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ListTokensInput {
    /// Network key or chain ID. Defaults to the wallet's current network.
    #[serde(default)]
    pub network: Option<String>,
}

/// Input parameters for the get_swap_quote tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct GetSwapQuoteInput {
    /// Token to buy: symbol (e.g., "USDT") or contract address.
    pub token: String,
    /// Amount of ETH to spend (human-readable, e.g., "0.1").
    pub amount: String,
}

/// Input parameters for the buy_token tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct BuyTokenInput {
    /// Token to buy: symbol (e.g., "USDT") or contract address.
    pub token: String,
    /// Amount of ETH to spend (human-readable, e.g., "0.1").
    pub amount: String,
    /// Slippage tolerance in basis points (100 = 1%). Defaults to the configured value.
    #[serde(default)]
    pub slippage_bps: Option<u32>,
}

/// Input parameters for the transfer_eth tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct TransferEthInput {
    /// Recipient address (0x...).
    pub to: String,
    /// Amount of ETH (human-readable, e.g., "0.25").
    pub amount: String,
}

/// Input parameters for the transfer_token tool.
#[derive(Debug, Clone, serde::Deserialize, schemars::JsonSchema)]
pub struct TransferTokenInput {
    /// Token symbol from the token list or contract address.
    pub token: String,
    /// Recipient address (0x...).
    pub to: String,
    /// Amount in token units (human-readable, e.g., "12.5").
    pub amount: String,
    /// Token decimals. Required for contract addresses that are not in the token list.
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// A token resolved against a chain's token list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedToken {
    address: Account,
    symbol: Option<String>,
    decimals: Option<u8>,
}

impl ResolvedToken {
    fn symbol(&self) -> String {
        self.symbol.clone().unwrap_or_else(|| self.address.short())
    }

    fn require_decimals(&self, given: Option<u8>) -> Result<u8, AppError> {
        self.decimals.or(given).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Token {} is not in the token list; please pass its decimals",
                self.address
            ))
        })
    }
}

impl TryFrom<TokenListEntry> for ResolvedToken {
    type Error = AppError;

    fn try_from(entry: TokenListEntry) -> Result<Self, AppError> {
        Ok(Self {
            address: Account::parse(entry.address)?,
            symbol: Some(entry.symbol.to_string()),
            decimals: Some(entry.decimals),
        })
    }
}

/// Resolve a token symbol or address on `chain_id`.
fn resolve_token(chain_id: ChainId, token: &str) -> Result<ResolvedToken, AppError> {
    let token = token.trim();

    if token.starts_with("0x") || token.starts_with("0X") {
        let address = Account::parse(token)?;
        let entry = token_list(chain_id)
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address.as_str()));
        return match entry {
            Some(entry) => ResolvedToken::try_from(*entry),
            None => Ok(ResolvedToken { address, symbol: None, decimals: None }),
        };
    }

    let entry = find_token(chain_id, token).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Unknown token '{token}' on {}. Use a contract address instead.",
            describe(chain_id).name
        ))
    })?;
    ResolvedToken::try_from(entry)
}

/// Resolve a network key or chain ID.
fn resolve_network(network: &str) -> Result<NetworkDescriptor, AppError> {
    if let Some(descriptor) = by_key(network) {
        return Ok(descriptor.clone());
    }
    ChainId::parse(network)
        .map(describe)
        .map_err(|_| AppError::InvalidInput(format!("Unknown network '{network}'")))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

#[tool_router]
impl GoldTokenServer {
    /// Report whether a wallet is present and which account is connected.
    #[tool(description = "Show whether a wallet is available and which account is connected")]
    pub async fn wallet_status(&self) -> Result<String, McpError> {
        let snapshot = self.session.snapshot();
        to_json(&json!({
            "provider_available": self.session.provider().is_available(),
            "connected": snapshot.connected,
            "connecting": snapshot.connecting,
            "account": snapshot.account,
            "account_short": snapshot.account.as_ref().map(Account::short),
        }))
    }

    /// Prompt the wallet to connect an account.
    #[tool(description = "Connect the wallet. The user approves the request in their wallet.")]
    pub async fn connect_wallet(&self) -> Result<String, McpError> {
        tracing::info!("connect_wallet called");

        let account = self.session.connect().await?;
        to_json(&json!({
            "connected": true,
            "account": account,
            "account_short": account.short(),
        }))
    }

    /// Forget the connected account.
    #[tool(description = "Disconnect the wallet from this app")]
    pub async fn disconnect_wallet(&self) -> Result<String, McpError> {
        tracing::info!("disconnect_wallet called");

        self.session.disconnect();
        self.last_quote.lock().await.take();
        to_json(&self.session.snapshot())
    }

    /// Describe the network the wallet is on.
    #[tool(description = "Show the network the wallet is currently on")]
    pub async fn get_network(&self) -> Result<String, McpError> {
        let chain_id = self.wallet_chain().await?;
        to_json(&describe(chain_id))
    }

    /// Ask the wallet to switch networks, adding the network when the wallet
    /// does not know it.
    #[tool(
        description = "Switch the wallet to another network (mainnet, goerli, sepolia, polygon, mumbai, ... or a chain ID)"
    )]
    pub async fn switch_network(
        &self,
        Parameters(input): Parameters<SwitchNetworkInput>,
    ) -> Result<String, McpError> {
        tracing::info!(network = %input.network, "switch_network called");

        let target = resolve_network(&input.network)?;
        let provider = self.session.provider();
        let prompt = self.session.begin_prompt("network switch")?;

        match provider.switch_chain(target.chain_id).await {
            Ok(()) => {}
            Err(AppError::UnknownChain(_)) if target.is_known() => {
                tracing::info!(chain_id = %target.chain_id, "Wallet lacks network; adding it");
                provider.add_chain(&target).await?;
                provider.switch_chain(target.chain_id).await?;
            }
            Err(e) => return Err(e.into()),
        }
        drop(prompt);

        let chain_id = self.wallet_chain().await?;
        to_json(&describe(chain_id))
    }

    /// Native balance of the connected account.
    #[tool(description = "Get the ETH balance of the connected account on the current network")]
    pub async fn get_balance(&self) -> Result<String, McpError> {
        let balance = self.balance_service.native_balance().await?;
        to_json(&balance)
    }

    /// ERC-20 balance of the connected account.
    #[tool(description = "Get an ERC20 token balance of the connected account")]
    pub async fn get_token_balance(
        &self,
        Parameters(input): Parameters<GetTokenBalanceInput>,
    ) -> Result<String, McpError> {
        tracing::info!(token = %input.token, "get_token_balance called");

        self.session.require_account()?;
        let token = resolve_token(self.wallet_chain().await?, &input.token)?;
        let decimals = token.require_decimals(input.decimals)?;

        let balance =
            self.balance_service.token_balance(&token.address, &token.symbol(), decimals).await?;
        to_json(&balance)
    }

    /// USD reference price of a mainnet token.
    #[tool(description = "Get the USD price of an Ethereum mainnet token")]
    pub async fn get_token_price(
        &self,
        Parameters(input): Parameters<GetTokenPriceInput>,
    ) -> Result<String, McpError> {
        tracing::info!(token = %input.token, "get_token_price called");

        let token = resolve_token(ChainId::MAINNET, &input.token)?;
        match self.price_service.token_price(&token.address).await? {
            Some(price) => to_json(&price),
            None => to_json(&json!({
                "token": token.address,
                "price_usd": null,
                "message": "No price available for this token",
            })),
        }
    }

    /// Curated tokens for a network.
    #[tool(description = "List well-known tokens for a network")]
    pub async fn list_tokens(
        &self,
        Parameters(input): Parameters<ListTokensInput>,
    ) -> Result<String, McpError> {
        let chain_id = match &input.network {
            Some(network) => resolve_network(network)?.chain_id,
            None => self.wallet_chain().await.unwrap_or(self.swap_client.chain_id()),
        };

        let tokens = token_list(chain_id)
            .iter()
            .map(|entry| {
                let token = ResolvedToken::try_from(*entry)?;
                Ok(TokenInfo::erc20(&token.address, entry.symbol, entry.decimals))
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        to_json(&json!({
            "network": describe(chain_id).name,
            "chain_id": chain_id,
            "tokens": tokens,
        }))
    }

    /// Quote a purchase of a token with ETH.
    #[tool(description = "Get a swap quote for buying a token with ETH through the aggregator")]
    pub async fn get_swap_quote(
        &self,
        Parameters(input): Parameters<GetSwapQuoteInput>,
    ) -> Result<String, McpError> {
        tracing::info!(token = %input.token, amount = %input.amount, "get_swap_quote called");

        let token = resolve_token(self.swap_client.chain_id(), &input.token)?;
        let sell = TokenAmount::native(input.amount.as_str());
        let quote = self.swap_client.get_quote(&sell, token.address.as_str()).await?;

        let summary = quote.summary(&TokenInfo::native("ETH", sell.decimals()));
        *self.last_quote.lock().await = Some(quote);

        to_json(&json!({
            "quote": summary,
            "expires_in_secs": self.swap_client.quote_ttl().as_secs(),
        }))
    }

    /// Buy a token with ETH through the aggregator. The wallet signs.
    #[tool(
        description = "Buy a token with ETH through the aggregator. Reuses the last quote when it still matches; the user confirms the transaction in their wallet."
    )]
    pub async fn buy_token(
        &self,
        Parameters(input): Parameters<BuyTokenInput>,
    ) -> Result<String, McpError> {
        tracing::info!(
            token = %input.token,
            amount = %input.amount,
            slippage_bps = ?input.slippage_bps,
            "buy_token called"
        );

        let token = resolve_token(self.swap_client.chain_id(), &input.token)?;
        let sell = TokenAmount::native(input.amount.as_str());
        let slippage_bps = input.slippage_bps.unwrap_or(self.default_slippage_bps);
        let destination = token.address.as_str();

        let cached = {
            let last = self.last_quote.lock().await;
            let sell_amount = sell.base_units().ok();
            last.as_ref()
                .filter(|q| {
                    q.dst == token.address
                        && Some(q.sell_amount) == sell_amount
                        && self.swap_client.is_fresh(q)
                })
                .cloned()
        };

        let submitted = match cached {
            Some(quote) => {
                self.swap_client.buy_with_quote(&quote, &sell, destination, slippage_bps).await?
            }
            None => self.swap_client.buy(&sell, destination, slippage_bps).await?,
        };

        self.last_quote.lock().await.take();
        to_json(&submitted)
    }

    /// Send ETH from the connected account.
    #[tool(description = "Send ETH from the connected account. The user confirms in their wallet.")]
    pub async fn transfer_eth(
        &self,
        Parameters(input): Parameters<TransferEthInput>,
    ) -> Result<String, McpError> {
        tracing::info!(to = %input.to, amount = %input.amount, "transfer_eth called");

        let to = Account::parse(&input.to)?;
        let amount = TokenAmount::native(input.amount.as_str());
        let submitted = self.transfer_service.transfer_native(&to, &amount).await?;
        to_json(&submitted)
    }

    /// Send an ERC-20 token from the connected account.
    #[tool(
        description = "Send an ERC20 token from the connected account. The user confirms in their wallet."
    )]
    pub async fn transfer_token(
        &self,
        Parameters(input): Parameters<TransferTokenInput>,
    ) -> Result<String, McpError> {
        tracing::info!(
            token = %input.token,
            to = %input.to,
            amount = %input.amount,
            "transfer_token called"
        );

        let to = Account::parse(&input.to)?;
        self.session.require_account()?;
        let token = resolve_token(self.wallet_chain().await?, &input.token)?;
        let amount = TokenAmount::new(input.amount.as_str(), token.require_decimals(input.decimals)?);

        let submitted = self.transfer_service.transfer_token(&token.address, &to, &amount).await?;
        to_json(&submitted)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for GoldTokenServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "goldtoken-wallet".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Gold token wallet. Connect a wallet, check balances and network, get swap \
                 quotes, buy tokens with ETH and send transfers. Every transaction is signed \
                 in the user's wallet."
                    .to_string(),
            ),
        }
    }
}
