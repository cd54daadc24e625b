use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use regex::Regex;
use sha3::{Digest, Keccak256};

use crate::core::errors::{BridgeError, BridgeResult};

/// Denominator for basis-point values.
pub const BPS_DENOMINATOR: u64 = 10_000;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile"));

static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)(?:\.(\d+))?$").expect("Decimal regex pattern should always be valid")
});

/// Parse and validate an Ethereum address.
/// Mixed-case input must carry a valid EIP-55 checksum; all-lower or all-upper is accepted.
pub fn parse_address(address: &str) -> BridgeResult<Address> {
    let address = address.trim();
    if !ADDRESS_RE.is_match(address) {
        return Err(BridgeError::InvalidInput(format!("Invalid Ethereum address: {}", address)));
    }
    let body = &address[2..];
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if !is_all_lower && !is_all_upper && !is_eip55_checksum_valid(address) {
        return Err(BridgeError::InvalidInput(format!(
            "Invalid EIP-55 checksum for Ethereum address: {}",
            address
        )));
    }
    address
        .parse::<Address>()
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid Ethereum address: {}", e)))
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    let body = &addr[2..];
    let lower = body.to_lowercase();
    let mut keccak = Keccak256::new();
    keccak.update(lower.as_bytes());
    let hash = keccak.finalize();
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' if nibble >= 8 => return false,
            'A'..='F' if nibble < 8 => return false,
            _ => {}
        }
    }
    true
}

/// True for the empty string and any spelling of zero ("0", "0.0", "00.000").
pub fn is_zero_amount(amount: &str) -> bool {
    let amount = amount.trim();
    amount.chars().all(|c| c == '0' || c == '.') && amount.chars().filter(|&c| c == '.').count() <= 1
}

/// Convert a human decimal string into base units for a token with `decimals` decimals.
/// No signs, exponents or more fractional digits than the token supports.
pub fn parse_amount(amount: &str, decimals: u8) -> BridgeResult<U256> {
    let amount = amount.trim();
    let caps = DECIMAL_RE
        .captures(amount)
        .ok_or_else(|| BridgeError::InvalidInput(format!("Invalid decimal amount: {:?}", amount)))?;
    let whole = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if fraction.len() > decimals as usize {
        return Err(BridgeError::InvalidInput(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        )));
    }
    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));
    U256::from_dec_str(&digits)
        .map_err(|_| BridgeError::InvalidInput(format!("Amount {} is out of range", amount)))
}

/// Render base units as a trimmed decimal string ("100", "0.25").
pub fn format_amount(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// `floor(amount * (1 - max_slippage_bps / 10000))`.
pub fn min_amount_after_slippage(amount: U256, max_slippage_bps: u32) -> U256 {
    let bps = U256::from(max_slippage_bps.min(BPS_DENOMINATOR as u32));
    let keep = U256::from(BPS_DENOMINATOR) - bps;
    // Dividing first keeps the product in range for amounts near U256::MAX.
    let denominator = U256::from(BPS_DENOMINATOR);
    (amount / denominator) * keep + (amount % denominator) * keep / denominator
}
