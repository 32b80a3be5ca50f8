pub mod dmail;
pub mod ionic;
pub mod jumper;
pub mod layer_swap;
pub mod relay;
pub mod safe;
pub mod superbridge;
pub mod weth;

pub use dmail::DmailModule;
pub use ionic::IonicModule;
pub use jumper::JumperModule;
pub use layer_swap::LayerSwapModule;
pub use relay::RelayBridgeModule;
pub use safe::SafeModule;
pub use superbridge::SuperBridgeModule;
pub use weth::WethModule;

use crate::config::{LiskConfig, ModuleId};
use crate::utils::EvmExecutor;
use anyhow::Result;
use core_logic::ModuleAdapter;
use std::sync::Arc;

/// Modules wired from config, ready for the scheduler.
pub struct ModuleSet {
    /// Runs once per wallet before the main loop.
    pub pre_pass: Option<Arc<dyn ModuleAdapter>>,
    pub modules: Vec<Arc<dyn ModuleAdapter>>,
}

pub fn build_modules(config: &LiskConfig, executor: Arc<EvmExecutor>) -> Result<ModuleSet> {
    let source = config.source_network();

    let pre_pass: Option<Arc<dyn ModuleAdapter>> = if config.weth_unwrap {
        Some(Arc::new(WethModule::new(executor.clone(), source.clone())?))
    } else {
        None
    };

    let mut modules: Vec<Arc<dyn ModuleAdapter>> = Vec::new();
    for id in &config.enabled_modules {
        if modules.iter().any(|m| m.name() == id.label()) {
            continue;
        }
        let module: Arc<dyn ModuleAdapter> = match id {
            ModuleId::Dmail => Arc::new(DmailModule::new(
                executor.clone(),
                source.clone(),
                config.dmail,
            )?),
            ModuleId::Safe => Arc::new(SafeModule::new(
                executor.clone(),
                source.clone(),
                config.safe,
            )?),
            ModuleId::Ionic => Arc::new(IonicModule::new(
                executor.clone(),
                source.clone(),
                config.ionic.clone(),
            )?),
            ModuleId::Relay => Arc::new(RelayBridgeModule::new(
                executor.clone(),
                config.relay.clone(),
            )),
            ModuleId::LayerSwap => Arc::new(LayerSwapModule::new(
                executor.clone(),
                config.layerswap.clone(),
            )),
            ModuleId::SuperBridge => Arc::new(SuperBridgeModule::new(
                executor.clone(),
                config.superbridge.clone(),
            )),
            ModuleId::Jumper => Arc::new(JumperModule::new(
                executor.clone(),
                config.jumper.clone(),
            )),
        };
        modules.push(module);
    }

    Ok(ModuleSet { pre_pass, modules })
}
