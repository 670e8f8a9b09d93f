//! Host wallet capability.
//!
//! The wallet is reached through a single `{method, params}` request entry
//! point plus an `accountsChanged` event channel, mirroring EIP-1193. Anything
//! implementing [`HostWallet`] can back the provider adapter: the HTTP
//! transport in production, a scripted fake in tests.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Callback receiving the new account list on `accountsChanged`.
pub type AccountsHandler = Arc<dyn Fn(Vec<String>) + Send + Sync>;

/// Handle identifying a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A wallet request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Method name (e.g., `eth_accounts`).
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Request without parameters.
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), params: Vec::new() }
    }

    /// Request with parameters.
    pub fn with_params(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self { method: method.into(), params }
    }
}

/// Error reported by the wallet, carrying its EIP-1193 / JSON-RPC code.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct HostError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

impl HostError {
    /// Build an error.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// The host-provided wallet capability.
#[async_trait]
pub trait HostWallet: Send + Sync {
    /// Execute a request and return its method-specific result.
    async fn request(&self, request: RpcRequest) -> Result<Value, HostError>;

    /// Register a listener for `accountsChanged`.
    fn on_accounts_changed(&self, handler: AccountsHandler) -> ListenerId;

    /// Remove a listener. Unknown IDs are ignored.
    fn remove_listener(&self, id: ListenerId);
}

/// Listener bookkeeping shared by host implementations.
///
/// Handlers run in registration order, outside the lock, so a handler may
/// register or remove listeners itself.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    handlers: Mutex<BTreeMap<ListenerId, AccountsHandler>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn add(&self, handler: AccountsHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).insert(id, handler);
        id
    }

    /// Remove a handler, returning whether it was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an account list to every handler.
    pub fn emit(&self, accounts: &[String]) {
        let handlers: Vec<AccountsHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handler in handlers {
            handler(accounts.to_vec());
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry").field("listeners", &self.len()).finish()
    }
}
