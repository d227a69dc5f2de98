use anyhow::Result;

use crate::domain::biometric::DailyBiometricSample;
use crate::domain::table::RawTable;

#[async_trait::async_trait]
pub trait LedgerSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// The raw transaction worksheet, header row split off.
    async fn fetch_ledger(&self) -> Result<RawTable>;
}

#[async_trait::async_trait]
pub trait BiometricSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Daily samples ordered by date, oldest first.
    async fn fetch_daily_samples(&self) -> Result<Vec<DailyBiometricSample>>;
}
