//! Hand-encoded ERC-20 call data.
//!
//! Only `balanceOf(address)` and `transfer(address,uint256)` are needed, so the
//! calldata is assembled directly: a 4-byte selector followed by 32-byte
//! words, each rendered as 64 hex characters.

use alloy::primitives::U256;

use crate::{
    error::{AppError, Result},
    types::Account,
};

/// Selector of `balanceOf(address)`.
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: &str = "a9059cbb";

/// Hex characters in one ABI word.
const WORD_HEX_LEN: usize = 64;

fn address_word(address: &Account) -> String {
    format!("{:0>64}", address.hex_body())
}

fn uint_word(value: U256) -> String {
    format!("{:0>64}", format!("{value:x}"))
}

/// Calldata for `balanceOf(owner)`.
pub fn encode_balance_of(owner: &str) -> Result<String> {
    let owner = Account::parse(owner)?;
    Ok(format!("0x{BALANCE_OF_SELECTOR}{}", address_word(&owner)))
}

/// Calldata for `transfer(to, amount)`, with `amount` in base units.
pub fn encode_transfer(to: &str, amount: U256) -> Result<String> {
    let to = Account::parse(to)?;
    Ok(format!("0x{TRANSFER_SELECTOR}{}{}", address_word(&to), uint_word(amount)))
}

fn strip_hex(data: &str) -> &str {
    data.strip_prefix("0x").or_else(|| data.strip_prefix("0X")).unwrap_or(data)
}

/// Recover the address argument from `balanceOf` or `transfer` calldata.
pub fn decode_address(calldata: &str) -> Result<Account> {
    let body = strip_hex(calldata.trim());
    if !body.is_ascii() {
        return Err(AppError::Parse("Calldata is not hex".into()));
    }
    if body.len() < 8 + WORD_HEX_LEN {
        return Err(AppError::Parse(format!("Calldata too short: {} hex characters", body.len())));
    }

    let word = &body[8..8 + WORD_HEX_LEN];
    let (padding, address) = word.split_at(WORD_HEX_LEN - 40);
    if padding.bytes().any(|b| b != b'0') {
        return Err(AppError::Parse("Address word has non-zero padding".into()));
    }

    Account::parse(&format!("0x{address}"))
}

/// Decode a single `uint256` return value, as returned by `eth_call`.
///
/// `0x` (an empty return) decodes to zero.
pub fn decode_uint(word: &str) -> Result<U256> {
    let body = strip_hex(word.trim());
    if body.len() > WORD_HEX_LEN {
        return Err(AppError::Parse(format!("Return data longer than one word: {word}")));
    }
    if body.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(body, 16)
        .map_err(|e| AppError::Parse(format!("Invalid uint256 return data '{word}': {e}")))
}
