//! Integration tests for the swap quote client and the buy flow.
//!
//! Run with: `cargo test --test test_swap`

mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use alloy::primitives::U256;
use common::{
    quote_body, swap_body, test_config, FakeWallet, Gate, MockApi, Reply, ALICE_LOWER, BOB,
    ROUTER, USDT,
};
use goldtoken_wallet::{
    mcp::{BuyTokenInput, GetSwapQuoteInput},
    types::TokenAmount,
    AppError, Config, SwapClient, WalletSession,
};
use rmcp::handler::server::wrapper::Parameters;
use serde_json::{json, Value};

async fn connected_client(wallet: &Arc<FakeWallet>, config: &Config) -> SwapClient {
    let session = Arc::new(WalletSession::mount(wallet.provider()).await);
    SwapClient::new(config, session).unwrap()
}

/// Aggregator answering quotes and swaps with fixed bodies.
async fn aggregator(quote: Value, swap: Value) -> MockApi {
    MockApi::start(move |req| {
        if req.path.contains("/quote") {
            Reply::ok(quote.clone())
        } else if req.path.contains("/swap") {
            Reply::ok(swap.clone())
        } else {
            Reply::status(404, json!({"error": "not found"}))
        }
    })
    .await
}

#[tokio::test]
async fn test_get_quote() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let quote = client.get_quote(&TokenAmount::native("0.1"), USDT).await.unwrap();
    assert_eq!(quote.to_amount, U256::from(312_450_000u64));
    assert_eq!(quote.sell_amount, U256::from(100_000_000_000_000_000u64));
    assert_eq!(quote.estimated_gas, 187_000);
    assert_eq!(quote.to_token.symbol, "USDT");
    assert_eq!(quote.to_token.decimals, 6);

    let requests = api.requests_to("/quote");
    assert_eq!(requests.len(), 1);
    let path = &requests[0].path;
    assert!(path.starts_with("/1/quote?"), "unexpected path {path}");
    assert!(path.contains("src=0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"));
    assert!(path.contains(&format!("dst={USDT}")));
    assert!(path.contains("amount=100000000000000000"));
}

#[tokio::test]
async fn test_quote_sends_api_key() {
    let api = aggregator(quote_body("1"), swap_body(ALICE_LOWER)).await;
    let config = Config { aggregator_api_key: Some("secret".into()), ..test_config(&api.url) };
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &config).await;

    client.get_quote(&TokenAmount::native("1"), USDT).await.unwrap();
    assert_eq!(api.requests()[0].header("authorization"), Some("Bearer secret"));
}

#[tokio::test]
async fn test_quote_without_decimals_is_upstream_error() {
    let body = json!({"toAmount": "312450000", "estimatedGas": 187000, "toToken": {"symbol": "USDT"}});
    let api = aggregator(body, swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let result = client.buy(&TokenAmount::native("0.1"), USDT, 100).await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert!(api.requests_to("/swap").is_empty());
    assert!(wallet.calls("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn test_aggregator_error_status_is_upstream_error() {
    let api = MockApi::start(|_| {
        Reply::status(400, json!({"error": "Bad Request", "description": "insufficient liquidity"}))
    })
    .await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    match client.get_quote(&TokenAmount::native("0.1"), USDT).await {
        Err(AppError::Upstream(msg)) => assert!(msg.contains("insufficient liquidity")),
        other => panic!("Expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_aggregator_is_network_error() {
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config("http://127.0.0.1:9")).await;

    let result = client.get_quote(&TokenAmount::native("0.1"), USDT).await;
    assert!(matches!(result, Err(AppError::Network(_))));
}

#[tokio::test]
async fn test_invalid_input_makes_no_request() {
    let api = aggregator(quote_body("1"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    for amount in ["", "-1", "1e18", "1.2.3", "0", "0.0000000000000000001"] {
        let result = client.get_quote(&TokenAmount::native(amount), USDT).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))), "amount {amount:?}");
    }
    let result = client.get_quote(&TokenAmount::native("1"), "0xdac17f958d2ee523").await;
    assert!(matches!(result, Err(AppError::InvalidAddress(_))));

    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_quote_discarded_when_account_removed_mid_flight() {
    let gate = Gate::new();
    let api = MockApi::start({
        let gate = gate.clone();
        move |_| Reply::ok(quote_body("312450000")).gated(gate.clone())
    })
    .await;
    let wallet = FakeWallet::authorized();
    let client = Arc::new(connected_client(&wallet, &test_config(&api.url)).await);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get_quote(&TokenAmount::native("0.1"), USDT).await }
    });
    gate.entered().await;

    wallet.emit_accounts(&[]);
    gate.release();

    assert!(matches!(pending.await.unwrap(), Err(AppError::Superseded(_))));
}

#[tokio::test]
async fn test_quote_discarded_when_account_switched_mid_flight() {
    let gate = Gate::new();
    let api = MockApi::start({
        let gate = gate.clone();
        move |_| Reply::ok(quote_body("312450000")).gated(gate.clone())
    })
    .await;
    let wallet = FakeWallet::authorized();
    let client = Arc::new(connected_client(&wallet, &test_config(&api.url)).await);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get_quote(&TokenAmount::native("0.1"), USDT).await }
    });
    gate.entered().await;

    wallet.emit_accounts(&[BOB]);
    gate.release();

    assert!(matches!(pending.await.unwrap(), Err(AppError::Superseded(_))));
}

#[tokio::test]
async fn test_newer_quote_supersedes_older() {
    let gate = Gate::new();
    let first_seen = Arc::new(AtomicBool::new(false));
    let api = MockApi::start({
        let gate = gate.clone();
        move |req| {
            // Only the first request is held back
            let reply = if req.path.contains("amount=100000000000000000&") {
                Reply::ok(quote_body("1"))
            } else {
                Reply::ok(quote_body("2"))
            };
            if first_seen.swap(true, Ordering::SeqCst) {
                reply
            } else {
                reply.gated(gate.clone())
            }
        }
    })
    .await;
    let wallet = FakeWallet::authorized();
    let client = Arc::new(connected_client(&wallet, &test_config(&api.url)).await);

    let older = tokio::spawn({
        let client = client.clone();
        async move { client.get_quote(&TokenAmount::native("0.1"), USDT).await }
    });
    gate.entered().await;

    let newer = client.get_quote(&TokenAmount::native("0.2"), USDT).await.unwrap();
    assert_eq!(newer.to_amount, U256::from(2u8));

    gate.release();
    assert!(matches!(older.await.unwrap(), Err(AppError::Superseded(_))));
}

#[tokio::test]
async fn test_buy_submits_aggregator_transaction() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let submitted = client.buy(&TokenAmount::native("0.1"), USDT, 50).await.unwrap();
    assert_eq!(submitted.tx_hash, format!("0x{:064x}", 1));
    assert!(submitted.explorer_url.unwrap().starts_with("https://etherscan.io/tx/0x"));

    let swap = &api.requests_to("/swap")[0];
    assert!(swap.path.contains(&format!("from={ALICE_LOWER}")));
    assert!(swap.path.contains("slippage=0.5"));

    let sent = wallet.calls("eth_sendTransaction");
    assert_eq!(sent.len(), 1);
    let tx = &sent[0].params[0];
    assert_eq!(tx["from"], ALICE_LOWER);
    assert_eq!(tx["to"], ROUTER);
    assert_eq!(tx["data"], "0x12aa3caf000000000000000000000000");
    assert_eq!(tx["value"], "0x16345785d8a0000");
    assert_eq!(tx["gas"], "0x2da78");
}

#[tokio::test]
async fn test_buy_rejects_malformed_swap_response() {
    let mut swap = swap_body(ALICE_LOWER);
    swap["tx"].as_object_mut().unwrap().remove("data");
    let api = aggregator(quote_body("312450000"), swap).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let result = client.buy(&TokenAmount::native("0.1"), USDT, 100).await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert!(wallet.calls("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn test_buy_rejects_swap_for_another_sender() {
    let api = aggregator(quote_body("312450000"), swap_body(BOB)).await;
    let wallet = FakeWallet::authorized();
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let result = client.buy(&TokenAmount::native("0.1"), USDT, 100).await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert!(wallet.calls("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn test_buy_requires_matching_chain() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    wallet.set_chain("0x5");
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    match client.buy(&TokenAmount::native("0.1"), USDT, 100).await {
        Err(AppError::InvalidInput(msg)) => assert!(msg.contains("Goerli Testnet")),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }
    assert!(wallet.calls("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn test_buy_user_rejection() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    wallet.reject_next("eth_sendTransaction");
    let client = connected_client(&wallet, &test_config(&api.url)).await;

    let result = client.buy(&TokenAmount::native("0.1"), USDT, 100).await;
    assert!(matches!(result, Err(AppError::UserRejected)));
}

#[tokio::test]
async fn test_buy_token_tool_reuses_last_quote() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::authorized();
    let server = common::create_test_server(&wallet, &api.url).await;

    let quote = server
        .get_swap_quote(Parameters(GetSwapQuoteInput {
            token: "USDT".into(),
            amount: "0.1".into(),
        }))
        .await
        .unwrap();
    let quote: Value = serde_json::from_str(&quote).unwrap();
    assert_eq!(quote["quote"]["buy_amount"], "312.45");
    assert_eq!(quote["quote"]["buy_token"]["symbol"], "USDT");
    assert_eq!(quote["expires_in_secs"], 30);

    let bought = server
        .buy_token(Parameters(BuyTokenInput {
            token: "usdt".into(),
            amount: "0.10".into(),
            slippage_bps: None,
        }))
        .await
        .unwrap();
    let bought: Value = serde_json::from_str(&bought).unwrap();
    assert_eq!(bought["transaction"]["to"], ROUTER);

    assert_eq!(api.requests_to("/quote").len(), 1);
    assert!(api.requests_to("/swap")[0].path.contains("slippage=1"));

    // The quote was consumed; the next purchase quotes again
    server
        .buy_token(Parameters(BuyTokenInput {
            token: "USDT".into(),
            amount: "0.1".into(),
            slippage_bps: Some(200),
        }))
        .await
        .unwrap();
    assert_eq!(api.requests_to("/quote").len(), 2);
}

#[tokio::test]
async fn test_quote_without_connected_wallet() {
    let api = aggregator(quote_body("312450000"), swap_body(ALICE_LOWER)).await;
    let wallet = FakeWallet::new();
    let server = common::create_test_server(&wallet, &api.url).await;

    let quote = server
        .get_swap_quote(Parameters(GetSwapQuoteInput { token: "USDT".into(), amount: "0.1".into() }))
        .await
        .unwrap();
    let quote: Value = serde_json::from_str(&quote).unwrap();
    assert_eq!(quote["quote"]["buy_amount"], "312.45");
    assert_eq!(api.requests_to("/quote").len(), 1);

    // Buying still needs an account
    let err = server
        .buy_token(Parameters(BuyTokenInput {
            token: "USDT".into(),
            amount: "0.1".into(),
            slippage_bps: None,
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("connect your wallet"));
    assert!(api.requests_to("/swap").is_empty());
    assert!(wallet.calls("eth_sendTransaction").is_empty());
}
