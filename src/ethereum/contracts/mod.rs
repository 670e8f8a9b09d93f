//! Smart contract call encoding.

pub mod erc20;
