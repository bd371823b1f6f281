use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use azfail_core::error::AzResult;
use azfail_core::request::Tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetInfo {
    pub subnet_id: String,
    pub vpc_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaclAssociation {
    pub association_id: String,
    pub network_acl_id: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAclInfo {
    pub network_acl_id: String,
    pub vpc_id: String,
    /// True when the ACL carries the blackhole sentinel tag.
    pub is_blackhole: bool,
    pub associations: Vec<NaclAssociation>,
}

/// EC2 instance lifecycle category, deciding which stop path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceLifecycle {
    Normal,
    Spot,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotRequestKind {
    Persistent,
    OneTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotRequestInfo {
    pub request_id: String,
    pub instance_id: String,
    pub kind: SpotRequestKind,
}

/// Instance state names as the EC2 API reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub lifecycle: InstanceLifecycle,
    pub state: InstanceState,
    pub spot_request_id: Option<String>,
}

/// Result of a stop/start/terminate call for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTransition {
    pub instance_id: String,
    pub previous_state: InstanceState,
    pub current_state: InstanceState,
}

/// Outcome of attempting to create one deny-all NACL entry. The executor
/// owns the decrement-and-retry loop on rule-number collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Created,
    RuleNumberTaken,
}

#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Subnets matching every provided criterion; `subnet_ids` empty means
    /// no id restriction.
    async fn subnets(
        &self,
        az: Option<&str>,
        tags: &[Tag],
        subnet_ids: &[String],
    ) -> AzResult<Vec<SubnetInfo>>;

    /// NACLs in a VPC that hold an association for any of the given subnets.
    async fn network_acls_for_subnets(
        &self,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> AzResult<Vec<NetworkAclInfo>>;

    /// Creates an empty NACL tagged with the blackhole sentinel, returning
    /// its id.
    async fn create_blackhole_acl(&self, vpc_id: &str) -> AzResult<String>;

    async fn create_deny_all_entry(
        &self,
        acl_id: &str,
        rule_number: i32,
        egress: bool,
    ) -> AzResult<EntryOutcome>;

    /// Repoints a subnet association at another ACL, returning the new
    /// association id.
    async fn replace_network_acl_association(
        &self,
        association_id: &str,
        acl_id: &str,
    ) -> AzResult<String>;

    async fn delete_network_acl(&self, acl_id: &str) -> AzResult<()>;

    /// Instances in the AZ matching the tags, restricted to the given state
    /// names; `instance_ids` empty means no id restriction.
    async fn instances(
        &self,
        az: &str,
        tags: &[Tag],
        instance_ids: &[String],
        states: &[InstanceState],
    ) -> AzResult<Vec<InstanceInfo>>;

    async fn spot_requests(&self, request_ids: &[String]) -> AzResult<Vec<SpotRequestInfo>>;

    async fn stop_instances(
        &self,
        instance_ids: &[String],
        force: bool,
    ) -> AzResult<Vec<InstanceTransition>>;

    async fn terminate_instances(&self, instance_ids: &[String])
        -> AzResult<Vec<InstanceTransition>>;

    async fn start_instances(&self, instance_ids: &[String]) -> AzResult<Vec<InstanceTransition>>;

    async fn cancel_spot_requests(&self, request_ids: &[String]) -> AzResult<()>;

    /// Current live state of one instance.
    async fn instance_state(&self, instance_id: &str) -> AzResult<InstanceState>;

    /// The region's default VPC id, if one exists.
    async fn default_vpc_id(&self) -> AzResult<Option<String>>;
}
