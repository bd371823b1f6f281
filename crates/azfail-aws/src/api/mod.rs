//! Narrow capability traits over the AWS APIs each service needs.
//!
//! The engine and the service modules are written against these traits, not
//! against SDK clients, so every discover/plan/mutate path can be exercised
//! with in-memory fakes. The `crate::sdk` module provides the real
//! implementations.

use azfail_core::request::Tag;

pub mod asg;
pub mod ec2;
pub mod eks;
pub mod elasticache;
pub mod elb;
pub mod elbv2;
pub mod mq;
pub mod rds;

pub use asg::{AsgDetail, AutoScalingApi};
pub use ec2::{
    Ec2Api, EntryOutcome, InstanceInfo, InstanceLifecycle, InstanceState, InstanceTransition,
    NaclAssociation, NetworkAclInfo, SpotRequestInfo, SpotRequestKind, SubnetInfo,
};
pub use eks::{EksApi, NodegroupDetail};
pub use elasticache::{CacheMember, CacheNodeGroup, ElastiCacheApi, ReplicationGroupInfo};
pub use elb::{ClassicElbApi, ClassicLbDetail};
pub use elbv2::{ElbV2Api, LbKind, LbV2Detail, LbZone};
pub use mq::{BrokerDeployment, BrokerSummaryInfo, MqApi};
pub use rds::{DbClusterInfo, DbInstanceInfo, RdsApi};

/// Hard cap several describe-tags style APIs place on identifiers per call.
/// Locators chunk their batches to this size and merge the results.
pub const DESCRIBE_TAGS_CHUNK: usize = 20;

/// AND-semantics tag match: every requested tag must be present with the
/// exact requested value.
pub fn tags_match(resource_tags: &[Tag], wanted: &[Tag]) -> bool {
    wanted.iter().all(|w| resource_tags.contains(w))
}

/// Filters identifiers down to those carrying every wanted tag, fetching
/// tags in [`DESCRIBE_TAGS_CHUNK`]-sized batches. `fetch` maps one batch of
/// identifiers to their tag lists.
pub(crate) async fn filter_tagged<F, Fut>(
    ids: Vec<String>,
    wanted: &[Tag],
    fetch: F,
) -> azfail_core::AzResult<Vec<String>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: std::future::Future<
        Output = azfail_core::AzResult<std::collections::HashMap<String, Vec<Tag>>>,
    >,
{
    let mut matched = Vec::new();
    for chunk in ids.chunks(DESCRIBE_TAGS_CHUNK) {
        let tags = fetch(chunk.to_vec()).await?;
        for id in chunk {
            if tags.get(id).is_some_and(|t| tags_match(t, wanted)) {
                matched.push(id.clone());
            }
        }
    }
    Ok(matched)
}
