use core_logic::{AmountPolicy, ModuleError};
use ethers::prelude::*;
use rand::Rng;

/// `balance * pct` with `pct` drawn uniformly from the policy range.
pub fn balance_share<R: Rng + ?Sized>(balance: U256, policy: &AmountPolicy, rng: &mut R) -> U256 {
    const SCALE: u64 = 1_000_000;
    let pct = if policy.min_pct >= policy.max_pct {
        policy.min_pct
    } else {
        rng.gen_range(policy.min_pct..=policy.max_pct)
    };
    let parts = (pct * SCALE as f64).round() as u64;
    balance * U256::from(parts) / U256::from(SCALE)
}

/// Quantity as APIs send it: `0x`-prefixed hex or plain decimal.
pub fn parse_quantity(raw: &str) -> Result<U256, ModuleError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some("") => Ok(U256::zero()),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(raw).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| ModuleError::build(format!("bad quantity {:?}: {}", raw, e)))
}

/// Wei as a float amount of ether, for APIs that take decimal amounts.
pub fn to_ether(value: U256) -> f64 {
    ethers::utils::format_units(value, "ether")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

pub fn format_ether(value: U256) -> String {
    ethers::utils::format_units(value, "ether").unwrap_or_else(|_| value.to_string())
}
