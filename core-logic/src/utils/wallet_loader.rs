use crate::config::ProxyConfig;
use crate::error::WalletError;
use crate::model::WalletRecord;
use crate::traits::WalletLoader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const COL_ADDRESS: &str = "address";
const COL_PRIVATE_KEY: &str = "private_key";
const COL_PROXY: &str = "proxy";
const COL_CONTRACTS: &str = "contracts_count";
const COL_BRIDGE_CHAIN: &str = "bridge_chain_id";

/// Loads wallets from a comma-separated file with a header row.
///
/// Recognized columns (case-insensitive, spaces and underscores equivalent):
/// `address`, `private_key`, `proxy`, `contracts_count`, `bridge_chain_id`.
/// `Wallet Address` and `Private Key` are accepted as aliases.
///
/// Cells are split on every comma; quoting is not supported. A row with more
/// cells than the header (for example a proxy password containing a comma)
/// is skipped rather than read with shifted columns.
pub struct CsvWalletLoader {
    path: PathBuf,
}

impl CsvWalletLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parses file content. Unusable rows are skipped with a warning.
    pub fn parse(content: &str) -> Result<Vec<WalletRecord>, WalletError> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (_, header) = lines.next().ok_or_else(|| WalletError::MissingHeader {
            path: "<input>".to_string(),
        })?;

        let width = header.split(',').count();
        let columns: HashMap<String, usize> = header
            .split(',')
            .enumerate()
            .map(|(i, name)| (normalize_header(name), i))
            .collect();

        for required in [COL_ADDRESS, COL_PRIVATE_KEY] {
            if !columns.contains_key(required) {
                return Err(WalletError::MissingColumn {
                    column: required.to_string(),
                });
            }
        }

        let mut wallets = Vec::new();
        for (row, line) in lines {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            if cells.len() > width {
                warn!(
                    "Skipping wallet: {}",
                    WalletError::MalformedRow {
                        row,
                        reason: format!(
                            "{} cells but the header has {}; quoted commas are not supported",
                            cells.len(),
                            width
                        ),
                    }
                );
                continue;
            }
            match parse_row(row, &cells, &columns) {
                Ok(wallet) => wallets.push(wallet),
                Err(e) => warn!("Skipping wallet: {}", e),
            }
        }

        Ok(wallets)
    }
}

#[async_trait]
impl WalletLoader for CsvWalletLoader {
    type Wallet = WalletRecord;

    async fn load_wallets(&self) -> Result<Vec<WalletRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read wallet file {}", self.path.display()))?;

        let wallets = Self::parse(&content).map_err(|e| match e {
            WalletError::MissingHeader { .. } => WalletError::MissingHeader {
                path: self.path.display().to_string(),
            },
            other => other,
        })?;

        if wallets.is_empty() {
            return Err(WalletError::NoWalletsFound {
                path: self.path.display().to_string(),
            }
            .into());
        }

        info!("Loaded {} wallets from {}", wallets.len(), self.path.display());
        Ok(wallets)
    }
}

fn normalize_header(name: &str) -> String {
    let key = name.trim().to_ascii_lowercase().replace(' ', "_");
    match key.as_str() {
        "wallet_address" => COL_ADDRESS.to_string(),
        "contracts" => COL_CONTRACTS.to_string(),
        _ => key,
    }
}

fn parse_row(
    row: usize,
    cells: &[&str],
    columns: &HashMap<String, usize>,
) -> Result<WalletRecord, WalletError> {
    let cell = |name: &str| {
        columns
            .get(name)
            .and_then(|&i| cells.get(i))
            .copied()
            .filter(|v| !v.is_empty())
    };
    let malformed = |reason: String| WalletError::MalformedRow { row, reason };

    let address = cell(COL_ADDRESS).ok_or_else(|| malformed("missing address".to_string()))?;
    let private_key =
        cell(COL_PRIVATE_KEY).ok_or_else(|| malformed("missing private key".to_string()))?;

    let contracts_count = match cell(COL_CONTRACTS) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| malformed(format!("invalid contracts_count '{}'", raw)))?,
        None => 1,
    };

    let bridge_chain_id = match cell(COL_BRIDGE_CHAIN) {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| malformed(format!("invalid bridge_chain_id '{}'", raw)))?,
        ),
        None => None,
    };

    let proxy = match cell(COL_PROXY).map(ProxyConfig::parse) {
        Some(Ok(proxy)) => Some(proxy),
        Some(Err(e)) => {
            warn!("Row {}: {}. Continuing without proxy.", row, e);
            None
        }
        None => None,
    };

    Ok(WalletRecord::new(address, private_key)
        .with_proxy(proxy)
        .with_contracts_count(contracts_count)
        .with_bridge_chain_id(bridge_chain_id))
}
