//! Wallet session.
//!
//! One shared session per running app holds the connection state. Consumers
//! read it through [`WalletSession::snapshot`] or follow it through
//! [`WalletSession::subscribe`]; it changes only through the transitions
//! below.
//!
//! ```text
//! Disconnected --connect()-----------------> Connecting
//! Connecting   --accounts [a, ..]-----------> Connected(a)
//! Connecting   --accounts [] / failure------> Disconnected
//! Connected(a) --accountsChanged([b, ..])---> Connected(b)
//! Connected(a) --accountsChanged([])--------> Disconnected
//! Connected(a) --disconnect()---------------> Disconnected
//! ```
//!
//! Only one wallet prompt (connect, send, network switch) runs at a time; a
//! second one fails with [`AppError::Busy`] until the first is answered.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard};

use crate::{
    error::{AppError, Result},
    ethereum::{ProviderAdapter, Subscription},
    types::Account,
};

/// Connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No account connected.
    #[default]
    Disconnected,
    /// Waiting for the user to answer the wallet prompt.
    Connecting,
    /// Connected to an account.
    Connected(Account),
}

impl SessionState {
    /// The connected account, if any.
    pub fn account(&self) -> Option<&Account> {
        match self {
            SessionState::Connected(account) => Some(account),
            _ => None,
        }
    }

    /// Whether an account is connected.
    pub fn is_connected(&self) -> bool {
        self.account().is_some()
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSnapshot {
    /// Connected account.
    pub account: Option<Account>,
    /// Whether an account is connected. Always `account.is_some()`.
    pub connected: bool,
    /// Whether a connect prompt is pending.
    pub connecting: bool,
}

impl From<&SessionState> for WalletSnapshot {
    fn from(state: &SessionState) -> Self {
        let account = state.account().cloned();
        Self {
            connected: account.is_some(),
            account,
            connecting: matches!(state, SessionState::Connecting),
        }
    }
}

/// Shared wallet session.
pub struct WalletSession {
    provider: ProviderAdapter,
    state: Arc<watch::Sender<SessionState>>,
    /// Number of `accountsChanged` events received.
    events: Arc<AtomicU64>,
    prompt: AsyncMutex<()>,
    subscription: Mutex<Option<Subscription>>,
}

/// Held while a wallet prompt is open. See [`WalletSession::begin_prompt`].
pub type PromptGuard<'a> = MutexGuard<'a, ()>;

impl WalletSession {
    /// Create the session, subscribe to account changes and restore an
    /// existing connection without prompting the user.
    pub async fn mount(provider: ProviderAdapter) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let state = Arc::new(state);
        let events = Arc::new(AtomicU64::new(0));

        let subscription = if provider.is_available() {
            let weak = Arc::downgrade(&state);
            let counter = events.clone();
            let subscribed = provider.subscribe_accounts_changed(move |accounts| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(state) = weak.upgrade() {
                    apply_accounts_changed(&state, accounts);
                }
            });
            match subscribed {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not subscribe to account changes");
                    None
                }
            }
        } else {
            tracing::info!("No wallet provider present");
            None
        };

        let session = Self {
            provider,
            state,
            events,
            prompt: AsyncMutex::new(()),
            subscription: Mutex::new(subscription),
        };
        session.restore().await;
        session
    }

    /// Silent connection check (`eth_accounts`). An account event received
    /// while the check is in flight wins over its result.
    async fn restore(&self) {
        if !self.provider.is_available() {
            return;
        }

        let seen = self.events.load(Ordering::SeqCst);
        match self.provider.current_accounts().await {
            Ok(accounts) => {
                let Some(account) = accounts.into_iter().next() else {
                    return;
                };
                let restored = self.state.send_if_modified(|state| {
                    if self.events.load(Ordering::SeqCst) != seen {
                        tracing::debug!("Account event arrived during restore; keeping it");
                        false
                    } else if *state == SessionState::Disconnected {
                        *state = SessionState::Connected(account.clone());
                        true
                    } else {
                        false
                    }
                });
                if restored {
                    tracing::info!(account = %account, "Restored wallet connection");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Error checking wallet connection"),
        }
    }

    /// The provider this session talks to.
    pub fn provider(&self) -> &ProviderAdapter {
        &self.provider
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current state as a snapshot.
    pub fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot::from(&*self.state.borrow())
    }

    /// Connected account, if any.
    pub fn account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    /// Whether an account is connected.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Connected account, or [`AppError::NotConnected`].
    pub fn require_account(&self) -> Result<Account> {
        self.account().ok_or(AppError::NotConnected)
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Claim the wallet for a prompt. Fails with [`AppError::Busy`] while
    /// another prompt is open; the prompt ends when the guard is dropped.
    pub fn begin_prompt(&self, action: &str) -> Result<PromptGuard<'_>> {
        self.prompt.try_lock().map_err(|_| {
            tracing::warn!(action, "Wallet prompt already open");
            AppError::Busy(action.to_string())
        })
    }

    /// Prompt the user to connect.
    ///
    /// Already connected: returns the current account without prompting.
    /// A prompt already pending: fails with [`AppError::Busy`].
    pub async fn connect(&self) -> Result<Account> {
        if !self.provider.is_available() {
            tracing::warn!("Connect requested without a wallet provider");
            return Err(AppError::ProviderUnavailable);
        }
        if let Some(account) = self.account() {
            return Ok(account);
        }
        let _prompt = self.begin_prompt("wallet connection")?;

        let mut existing = None;
        let mut pending = false;
        let started = self.state.send_if_modified(|state| match state {
            SessionState::Disconnected => {
                *state = SessionState::Connecting;
                true
            }
            SessionState::Connecting => {
                pending = true;
                false
            }
            SessionState::Connected(account) => {
                existing = Some(account.clone());
                false
            }
        });

        if let Some(account) = existing {
            return Ok(account);
        }
        if pending || !started {
            return Err(AppError::Busy("wallet connection".into()));
        }

        tracing::info!("Requesting wallet accounts");
        let outcome = self.provider.request_accounts().await;
        let next = match &outcome {
            Ok(accounts) => match accounts.first() {
                Some(account) => SessionState::Connected(account.clone()),
                None => SessionState::Disconnected,
            },
            Err(_) => SessionState::Disconnected,
        };

        let applied = self.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = next.clone();
                true
            } else {
                false
            }
        });

        match outcome {
            Err(e) => {
                tracing::warn!(error = %e, "Error connecting wallet");
                Err(e)
            }
            Ok(_) if !applied => {
                tracing::info!("Session changed while connecting; discarding result");
                Err(AppError::Superseded("session changed while connecting".into()))
            }
            Ok(_) => match next {
                SessionState::Connected(account) => {
                    tracing::info!(account = %account, "Wallet connected");
                    Ok(account)
                }
                _ => {
                    tracing::warn!("Wallet returned no accounts");
                    Err(AppError::NotConnected)
                }
            },
        }
    }

    /// Forget the connection locally. Wallets offer no programmatic
    /// disconnect, so the provider is not called.
    pub fn disconnect(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                false
            } else {
                *state = SessionState::Disconnected;
                true
            }
        });
        if changed {
            tracing::info!("Wallet disconnected");
        }
    }

    /// Release the account-change subscription. Idempotent.
    pub fn teardown(&self) {
        let subscription =
            self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(subscription) = subscription {
            self.provider.unsubscribe(subscription);
            tracing::debug!("Wallet session torn down");
        }
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("provider", &self.provider)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Apply an `accountsChanged` notification. Only a connected session follows
/// account changes; while disconnected or connecting the event is ignored.
fn apply_accounts_changed(state: &watch::Sender<SessionState>, accounts: Vec<Account>) {
    state.send_if_modified(|current| {
        let SessionState::Connected(previous) = current else {
            return false;
        };
        match accounts.into_iter().next() {
            Some(next) if next == *previous => false,
            Some(next) => {
                tracing::info!(from = %previous, to = %next, "Wallet account changed");
                *current = SessionState::Connected(next);
                true
            }
            None => {
                tracing::info!(account = %previous, "Wallet locked or account removed");
                *current = SessionState::Disconnected;
                true
            }
        }
    });
}
