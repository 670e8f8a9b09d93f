//! Type definitions module.
//!
//! Contains shared types used across the application.

pub mod account;
pub mod swap;
pub mod token;

pub use account::*;
pub use swap::*;
pub use token::*;
