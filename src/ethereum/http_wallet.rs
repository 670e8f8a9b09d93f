//! HTTP wallet transport.
//!
//! Speaks the `{method, params}` interface as JSON-RPC over HTTP to a local
//! wallet endpoint. HTTP has no push channel, so `accountsChanged` is produced
//! by a single polling task that compares successive `eth_accounts` results.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use super::host::{AccountsHandler, HostError, HostWallet, ListenerId, ListenerRegistry, RpcRequest};
use crate::error::{AppError, Result, INTERNAL_RPC_CODE};

/// EIP-1193 code for a provider that cannot reach its backend.
pub const DISCONNECTED_CODE: i64 = 4900;

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<HostError>,
}

struct Endpoint {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl Endpoint {
    async fn send(&self, request: &RpcRequest) -> std::result::Result<Value, HostError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": request.method,
            "params": request.params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HostError::new(DISCONNECTED_CODE, format!("Wallet unreachable: {e}")))?;

        let status = response.status();
        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            HostError::new(INTERNAL_RPC_CODE, format!("Invalid wallet response ({status}): {e}"))
        })?;

        if let Some(error) = body.error {
            return Err(error);
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

/// Wallet reached over JSON-RPC/HTTP.
pub struct HttpWallet {
    endpoint: Arc<Endpoint>,
    listeners: Arc<ListenerRegistry>,
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl HttpWallet {
    /// Create a transport for the wallet at `url`.
    ///
    /// No network call is made until the first request.
    pub fn new(url: &str, poll_interval: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::Config(format!("Invalid wallet RPC URL '{url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(wallet_url = %parsed, "Wallet transport created (lazy initialization)");

        Ok(Self {
            endpoint: Arc::new(Endpoint {
                client,
                url: parsed.to_string(),
                next_id: AtomicU64::new(0),
            }),
            listeners: Arc::new(ListenerRegistry::new()),
            poller: Mutex::new(None),
            poll_interval,
        })
    }

    fn start_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; account changes will not be observed");
            return;
        };

        let endpoint = self.endpoint.clone();
        let listeners = self.listeners.clone();
        let interval = self.poll_interval;

        *poller = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Vec<String>> = None;

            loop {
                ticker.tick().await;
                let accounts = match endpoint.send(&RpcRequest::new("eth_accounts")).await {
                    Ok(value) => accounts_from_value(&value),
                    Err(e) => {
                        tracing::debug!(error = %e, "Account poll failed");
                        continue;
                    }
                };
                let Some(accounts) = accounts else {
                    tracing::debug!("Account poll returned a non-array result");
                    continue;
                };

                match &last {
                    Some(previous) if *previous == accounts => {}
                    Some(_) => {
                        tracing::debug!(count = accounts.len(), "Wallet accounts changed");
                        listeners.emit(&accounts);
                        last = Some(accounts);
                    }
                    None => last = Some(accounts),
                }
            }
        }));
    }

    fn stop_polling(&self) {
        if let Some(task) = self.poller.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

fn accounts_from_value(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_ascii_lowercase()))
        .collect()
}

#[async_trait]
impl HostWallet for HttpWallet {
    async fn request(&self, request: RpcRequest) -> std::result::Result<Value, HostError> {
        tracing::debug!(method = %request.method, "Wallet request");
        self.endpoint.send(&request).await
    }

    fn on_accounts_changed(&self, handler: AccountsHandler) -> ListenerId {
        let id = self.listeners.add(handler);
        self.start_polling();
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
        if self.listeners.is_empty() {
            self.stop_polling();
        }
    }
}

impl Drop for HttpWallet {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl std::fmt::Debug for HttpWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWallet")
            .field("url", &self.endpoint.url)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_wallet_rejects_bad_url() {
        let result = HttpWallet::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_http_wallet_creation_is_lazy() {
        let wallet = HttpWallet::new("http://127.0.0.1:1248", Duration::from_secs(1)).unwrap();
        let debug = format!("{wallet:?}");
        assert!(debug.contains("127.0.0.1:1248"));
        assert!(debug.contains("listeners: 0"));
    }

    #[test]
    fn test_listener_without_runtime_does_not_panic() {
        let wallet = HttpWallet::new("http://127.0.0.1:1248", Duration::from_secs(1)).unwrap();
        let id = wallet.on_accounts_changed(Arc::new(|_: Vec<String>| {}));
        wallet.remove_listener(id);
    }

    #[test]
    fn test_accounts_from_value() {
        let value = json!(["0xABC", "0xdef"]);
        assert_eq!(accounts_from_value(&value).unwrap(), vec!["0xabc", "0xdef"]);
        assert!(accounts_from_value(&json!("0xabc")).is_none());
        assert!(accounts_from_value(&json!([1, 2])).is_none());
        assert_eq!(accounts_from_value(&json!([])).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_json_rpc_response_shapes() {
        let ok: JsonRpcResponse = serde_json::from_value(json!({"id": 1, "result": "0x1"})).unwrap();
        assert_eq!(ok.result, Some(json!("0x1")));
        assert!(ok.error.is_none());

        let err: JsonRpcResponse = serde_json::from_value(json!({
            "id": 1,
            "error": {"code": 4001, "message": "User rejected the request."}
        }))
        .unwrap();
        assert_eq!(err.error.unwrap().code, 4001);
    }

    #[tokio::test]
    async fn test_unreachable_wallet_reports_disconnected() {
        // Port 9 (discard) is never a wallet
        let wallet = HttpWallet::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = wallet.request(RpcRequest::new("eth_chainId")).await.unwrap_err();
        assert_eq!(err.code, DISCONNECTED_CODE);
    }
}
