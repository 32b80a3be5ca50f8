use crate::model::{OutcomeRecord, RunStatistics};
use crate::traits::ResultSink;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// In-process result sink. Used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().await.clone()
    }

    pub async fn records_for(&self, wallet_address: &str) -> Vec<OutcomeRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.wallet_address == wallet_address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn record(&self, outcome: &OutcomeRecord) -> Result<()> {
        self.records.lock().await.push(outcome.clone());
        Ok(())
    }

    async fn statistics(&self) -> Result<RunStatistics> {
        Ok(RunStatistics::from_records(self.records.lock().await.iter()))
    }
}
