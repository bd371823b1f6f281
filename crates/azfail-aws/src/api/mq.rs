use async_trait::async_trait;
use std::collections::HashMap;

use azfail_core::error::AzResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerDeployment {
    SingleInstance,
    ActiveStandbyMultiAz,
    ClusterMultiAz,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSummaryInfo {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub engine_type: String,
    pub deployment_mode: BrokerDeployment,
}

#[async_trait]
pub trait MqApi: Send + Sync {
    async fn brokers(&self) -> AzResult<Vec<BrokerSummaryInfo>>;

    async fn tags_for(&self, arn: &str) -> AzResult<HashMap<String, String>>;

    async fn broker_subnet_ids(&self, broker_id: &str) -> AzResult<Vec<String>>;

    /// Requests a broker reboot; the call returns once the request is
    /// accepted, not when the reboot completes.
    async fn reboot_broker(&self, broker_id: &str) -> AzResult<()>;
}
