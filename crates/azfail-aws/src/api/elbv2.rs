use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LbKind {
    Application,
    Network,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbZone {
    pub zone_name: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbV2Detail {
    pub name: String,
    pub arn: String,
    pub kind: LbKind,
    pub zones: Vec<LbZone>,
    pub active: bool,
}

#[async_trait]
pub trait ElbV2Api: Send + Sync {
    async fn load_balancers(&self) -> AzResult<Vec<LbV2Detail>>;

    /// Tags per LB ARN. Callers pass at most
    /// [`super::DESCRIBE_TAGS_CHUNK`] ARNs per call; the locator owns
    /// batching.
    async fn tags_for(&self, arns: &[String]) -> AzResult<HashMap<String, Vec<Tag>>>;

    async fn set_subnets(&self, arn: &str, subnet_ids: &[String]) -> AzResult<()>;
}
