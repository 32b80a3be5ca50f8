use core_logic::ModuleError;
use ethers::prelude::*;

/// Legacy gas pricing with a buffered limit and an optional price cap.
#[derive(Clone, Debug)]
pub struct GasManager {
    limit_buffer_pct: u64,
    max_gas_price_gwei: Option<f64>,
}

impl GasManager {
    pub const LIMIT_BUFFER_PCT_DEFAULT: u64 = 150;
    pub const LIMIT_WETH_WITHDRAW: U256 = U256([60_000, 0, 0, 0]);

    pub fn new() -> Self {
        Self {
            limit_buffer_pct: Self::LIMIT_BUFFER_PCT_DEFAULT,
            max_gas_price_gwei: None,
        }
    }

    pub fn with_max_gas_price(mut self, gwei: Option<f64>) -> Self {
        self.max_gas_price_gwei = gwei;
        self
    }

    /// Scales a node estimate by the configured buffer.
    pub fn buffered_limit(&self, estimate: U256) -> U256 {
        estimate * U256::from(self.limit_buffer_pct) / U256::from(100u64)
    }

    /// Current network gas price, clamped to the configured cap.
    pub async fn gas_price<M: Middleware>(&self, client: &M) -> Result<U256, ModuleError> {
        let price = client.get_gas_price().await.map_err(ModuleError::build)?;

        match self.max_gas_price_gwei {
            Some(cap) => {
                let cap = parse_gwei(cap)?;
                Ok(price.min(cap))
            }
            None => Ok(price),
        }
    }
}

impl Default for GasManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_gwei(amount: f64) -> Result<U256, ModuleError> {
    let parsed = ethers::utils::parse_units(format!("{}", amount), "gwei")
        .map_err(ModuleError::build)?;
    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_limit_adds_half() {
        let gas = GasManager::new();
        assert_eq!(gas.buffered_limit(U256::from(100_000u64)), U256::from(150_000u64));
    }

    #[test]
    fn test_parse_gwei() {
        assert_eq!(parse_gwei(1.5).unwrap(), U256::from(1_500_000_000u64));
    }
}
