//! Common utilities for integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use goldtoken_wallet::{
    ethereum::host::{AccountsHandler, ListenerId, ListenerRegistry},
    Config, GoldTokenServer, HostError, HostWallet, ProviderAdapter, RpcRequest,
};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::Notify,
};

/// Mixed-case address the fake wallet exposes by default.
pub const ALICE: &str = "0xD8DA6BF26964AF9D7EED9E03E53415D37AA96045";
pub const ALICE_LOWER: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
pub const BOB: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";
pub const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const ROUTER: &str = "0x1111111254eeb25477b68fb85ed929f73a960582";

/// Pauses a request until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until the gated request has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated request finish.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
struct FakeState {
    wallet_accounts: Vec<String>,
    exposed: Vec<String>,
    chain_id: String,
    known_chains: HashSet<String>,
    balances: HashMap<String, String>,
    scripted: HashMap<String, VecDeque<Result<Value, HostError>>>,
    gates: HashMap<String, Arc<Gate>>,
    requests: Vec<RpcRequest>,
    sent: u64,
}

/// Scripted in-memory wallet.
pub struct FakeWallet {
    state: Mutex<FakeState>,
    listeners: ListenerRegistry,
}

impl FakeWallet {
    /// Wallet holding [`ALICE`] on mainnet, not yet authorized for this app.
    pub fn new() -> Arc<Self> {
        let state = FakeState {
            wallet_accounts: vec![ALICE.to_string()],
            chain_id: "0x1".to_string(),
            known_chains: ["0x1", "0x5", "0xaa36a7"].into_iter().map(String::from).collect(),
            ..FakeState::default()
        };
        Arc::new(Self { state: Mutex::new(state), listeners: ListenerRegistry::new() })
    }

    /// Wallet that already exposes its accounts to this app.
    pub fn authorized() -> Arc<Self> {
        let wallet = Self::new();
        {
            let mut state = wallet.state.lock().unwrap();
            state.exposed = state.wallet_accounts.clone();
        }
        wallet
    }

    pub fn provider(self: &Arc<Self>) -> ProviderAdapter {
        ProviderAdapter::new(self.clone())
    }

    pub fn set_wallet_accounts(&self, accounts: &[&str]) {
        self.state.lock().unwrap().wallet_accounts =
            accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn set_chain(&self, chain_id: &str) {
        self.state.lock().unwrap().chain_id = chain_id.to_string();
    }

    pub fn set_balance(&self, account: &str, hex: &str) {
        self.state.lock().unwrap().balances.insert(account.to_lowercase(), hex.to_string());
    }

    /// Queue a result for the next call of `method`.
    pub fn script(&self, method: &str, result: Result<Value, HostError>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a 4001 rejection for the next call of `method`.
    pub fn reject_next(&self, method: &str) {
        self.script(method, Err(HostError::new(4001, "User rejected the request.")));
    }

    /// Hold the next call of `method` until the returned gate is released.
    pub fn gate(&self, method: &str) -> Arc<Gate> {
        let gate = Gate::new();
        self.state.lock().unwrap().gates.insert(method.to_string(), gate.clone());
        gate
    }

    /// Simulate the user switching or locking accounts.
    pub fn emit_accounts(&self, accounts: &[&str]) {
        let accounts: Vec<String> = accounts.iter().map(|a| a.to_string()).collect();
        {
            let mut state = self.state.lock().unwrap();
            state.wallet_accounts = accounts.clone();
            state.exposed = accounts.clone();
        }
        self.listeners.emit(&accounts);
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn calls(&self, method: &str) -> Vec<RpcRequest> {
        self.requests().into_iter().filter(|r| r.method == method).collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn respond(&self, request: &RpcRequest) -> Result<Value, HostError> {
        let mut state = self.state.lock().unwrap();

        if let Some(result) = state.scripted.get_mut(&request.method).and_then(VecDeque::pop_front)
        {
            return result;
        }

        match request.method.as_str() {
            "eth_accounts" => Ok(json!(state.exposed)),
            "eth_requestAccounts" => {
                state.exposed = state.wallet_accounts.clone();
                Ok(json!(state.exposed))
            }
            "eth_chainId" => Ok(json!(state.chain_id)),
            "eth_getBalance" => {
                let account = request.params[0].as_str().unwrap_or_default().to_lowercase();
                Ok(json!(state.balances.get(&account).cloned().unwrap_or_else(|| "0x0".into())))
            }
            "eth_call" => Ok(json!("0x")),
            "eth_sendTransaction" => {
                state.sent += 1;
                Ok(json!(format!("0x{:064x}", state.sent)))
            }
            "wallet_switchEthereumChain" => {
                let chain = request.params[0]["chainId"].as_str().unwrap_or_default().to_string();
                if state.known_chains.contains(&chain) {
                    state.chain_id = chain;
                    Ok(Value::Null)
                } else {
                    Err(HostError::new(4902, format!("Unrecognized chain ID \"{chain}\"")))
                }
            }
            "wallet_addEthereumChain" => {
                let chain = request.params[0]["chainId"].as_str().unwrap_or_default().to_string();
                state.known_chains.insert(chain);
                Ok(Value::Null)
            }
            other => Err(HostError::new(-32601, format!("Method {other} not supported"))),
        }
    }
}

#[async_trait]
impl HostWallet for FakeWallet {
    async fn request(&self, request: RpcRequest) -> Result<Value, HostError> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            state.gates.remove(&request.method)
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        self.respond(&request)
    }

    fn on_accounts_changed(&self, handler: AccountsHandler) -> ListenerId {
        self.listeners.add(handler)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

/// A request received by [`MockApi`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Reply from a [`MockApi`] handler.
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub gate: Option<Arc<Gate>>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body, gate: None }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self { status, body, gate: None }
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }
}

type Handler = Arc<dyn Fn(&Recorded) -> Reply + Send + Sync>;

/// Minimal HTTP/1.1 JSON server on a random local port.
pub struct MockApi {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockApi {
    pub async fn start(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let log = requests.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let handler = handler.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut socket).await else {
                        return;
                    };
                    log.lock().unwrap().push(request.clone());
                    let reply = handler(&request);
                    if let Some(gate) = &reply.gate {
                        gate.pass().await;
                    }
                    let body = reply.body.to_string();
                    let response = format!(
                        "HTTP/1.1 {} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        reply.status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { url, requests, task }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, fragment: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path.contains(fragment)).collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(Recorded { method, path, headers, body })
}

/// Config pointing the aggregator and price API at `api_url`.
pub fn test_config(api_url: &str) -> Config {
    Config {
        aggregator_url: api_url.to_string(),
        price_api_url: api_url.to_string(),
        log_level: "warn".to_string(),
        ..Config::default()
    }
}

/// Server over a fake wallet, with HTTP APIs at `api_url`.
pub async fn create_test_server(wallet: &Arc<FakeWallet>, api_url: &str) -> GoldTokenServer {
    GoldTokenServer::new(&test_config(api_url), wallet.provider()).await.unwrap()
}

/// Quote body in the aggregator's shape.
pub fn quote_body(to_amount: &str) -> Value {
    json!({
        "toAmount": to_amount,
        "estimatedGas": 187000,
        "toToken": {"symbol": "USDT", "name": "Tether USD", "decimals": 6, "address": USDT},
    })
}

/// Swap body in the aggregator's shape.
pub fn swap_body(from: &str) -> Value {
    json!({
        "toAmount": "312450000",
        "tx": {
            "from": from,
            "to": ROUTER,
            "data": "0x12aa3caf000000000000000000000000",
            "value": "100000000000000000",
            "gas": 187000,
            "gasPrice": "25000000000",
        }
    })
}

/// Wait for a watch channel to satisfy `f`, failing the test after a second.
pub async fn wait_for<T: Clone>(
    rx: &mut tokio::sync::watch::Receiver<T>,
    f: impl FnMut(&T) -> bool,
) -> T {
    tokio::time::timeout(std::time::Duration::from_secs(1), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("channel closed")
        .clone()
}

/// Server over the wallet at `WALLET_RPC_URL`, when one is configured.
pub async fn create_live_server() -> Option<GoldTokenServer> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().ok()?;
    let url = config.wallet_rpc_url.clone()?;
    let wallet = goldtoken_wallet::HttpWallet::new(&url, config.account_poll_interval).ok()?;

    GoldTokenServer::new(&config, ProviderAdapter::new(Arc::new(wallet))).await.ok()
}

/// Skip test if no live wallet is configured.
#[macro_export]
macro_rules! skip_if_no_wallet {
    () => {
        match common::create_live_server().await {
            Some(server) => server,
            None => {
                eprintln!("Skipping test: WALLET_RPC_URL not set");
                return;
            }
        }
    };
}
