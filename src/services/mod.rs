//! Business logic services module.

pub mod balance;
pub mod price;
pub mod session;
pub mod swap;
pub mod transfer;

pub use balance::BalanceService;
pub use price::PriceService;
pub use session::{SessionState, WalletSession, WalletSnapshot};
pub use swap::{SwapClient, MAX_SLIPPAGE_BPS};
pub use transfer::TransferService;
