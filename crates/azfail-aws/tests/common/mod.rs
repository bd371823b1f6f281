#![allow(dead_code)]

//! In-memory fakes for the capability traits, shared by the integration
//! tests. Every fake records its mutating calls in a coarse log so tests
//! can assert ordering and absence of mutations.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use azfail_aws::api::{
    AsgDetail, AutoScalingApi, BrokerDeployment, BrokerSummaryInfo, CacheNodeGroup, ClassicElbApi,
    ClassicLbDetail, DbClusterInfo, DbInstanceInfo, Ec2Api, EksApi, ElastiCacheApi, ElbV2Api,
    EntryOutcome, InstanceInfo, InstanceState, InstanceTransition, LbV2Detail, MqApi,
    NetworkAclInfo, NodegroupDetail, RdsApi, ReplicationGroupInfo, SpotRequestInfo, SubnetInfo,
    tags_match,
};
use azfail_core::{AzError, AzResult, Service, Tag};

pub fn marker_tags() -> Vec<Tag> {
    vec![Tag::failure_marker()]
}

#[derive(Default)]
pub struct FakeEc2 {
    pub subnets: Vec<SubnetInfo>,
    /// Tags per subnet id; a subnet with no entry matches only empty filters.
    pub subnet_tags: HashMap<String, Vec<Tag>>,
    pub nacls: Vec<NetworkAclInfo>,
    pub instances: Vec<InstanceInfo>,
    pub instance_azs: HashMap<String, String>,
    pub spot: Vec<SpotRequestInfo>,
    /// Live state per instance id, consulted by `instance_state`.
    pub live_states: Mutex<HashMap<String, InstanceState>>,
    /// Rule numbers that report a collision on entry creation.
    pub taken_rules: Vec<i32>,
    pub default_vpc: Option<String>,
    pub calls: Mutex<Vec<String>>,
    pub counter: Mutex<u32>,
}

impl FakeEc2 {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self) -> u32 {
        let mut n = self.counter.lock().unwrap();
        *n += 1;
        *n
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Ec2Api for FakeEc2 {
    async fn subnets(
        &self,
        az: Option<&str>,
        tags: &[Tag],
        subnet_ids: &[String],
    ) -> AzResult<Vec<SubnetInfo>> {
        Ok(self
            .subnets
            .iter()
            .filter(|s| az.map_or(true, |az| s.availability_zone == az))
            .filter(|s| subnet_ids.is_empty() || subnet_ids.contains(&s.subnet_id))
            .filter(|s| {
                tags.is_empty()
                    || self
                        .subnet_tags
                        .get(&s.subnet_id)
                        .is_some_and(|t| tags_match(t, tags))
            })
            .cloned()
            .collect())
    }

    async fn network_acls_for_subnets(
        &self,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> AzResult<Vec<NetworkAclInfo>> {
        Ok(self
            .nacls
            .iter()
            .filter(|acl| acl.vpc_id == vpc_id)
            .filter(|acl| {
                acl.associations
                    .iter()
                    .any(|a| subnet_ids.contains(&a.subnet_id))
            })
            .cloned()
            .collect())
    }

    async fn create_blackhole_acl(&self, vpc_id: &str) -> AzResult<String> {
        let id = format!("acl-bh-{}", self.next());
        self.record(format!("create_blackhole:{vpc_id}:{id}"));
        Ok(id)
    }

    async fn create_deny_all_entry(
        &self,
        acl_id: &str,
        rule_number: i32,
        egress: bool,
    ) -> AzResult<EntryOutcome> {
        self.record(format!("deny_entry:{acl_id}:{rule_number}:{egress}"));
        if self.taken_rules.contains(&rule_number) {
            Ok(EntryOutcome::RuleNumberTaken)
        } else {
            Ok(EntryOutcome::Created)
        }
    }

    async fn replace_network_acl_association(
        &self,
        association_id: &str,
        acl_id: &str,
    ) -> AzResult<String> {
        let new_id = format!("aclassoc-new-{}", self.next());
        self.record(format!("replace_assoc:{association_id}->{acl_id}"));
        Ok(new_id)
    }

    async fn delete_network_acl(&self, acl_id: &str) -> AzResult<()> {
        self.record(format!("delete_acl:{acl_id}"));
        Ok(())
    }

    async fn instances(
        &self,
        az: &str,
        _tags: &[Tag],
        instance_ids: &[String],
        states: &[InstanceState],
    ) -> AzResult<Vec<InstanceInfo>> {
        Ok(self
            .instances
            .iter()
            .filter(|i| self.instance_azs.get(&i.instance_id).map_or(true, |a| a == az))
            .filter(|i| instance_ids.is_empty() || instance_ids.contains(&i.instance_id))
            .filter(|i| states.contains(&i.state))
            .cloned()
            .collect())
    }

    async fn spot_requests(&self, request_ids: &[String]) -> AzResult<Vec<SpotRequestInfo>> {
        Ok(self
            .spot
            .iter()
            .filter(|r| request_ids.contains(&r.request_id))
            .cloned()
            .collect())
    }

    async fn stop_instances(
        &self,
        instance_ids: &[String],
        force: bool,
    ) -> AzResult<Vec<InstanceTransition>> {
        self.record(format!("stop:force={force}:{}", instance_ids.join(",")));
        let mut live = self.live_states.lock().unwrap();
        Ok(instance_ids
            .iter()
            .map(|id| {
                live.insert(id.clone(), InstanceState::Stopped);
                InstanceTransition {
                    instance_id: id.clone(),
                    previous_state: InstanceState::Running,
                    current_state: InstanceState::Stopping,
                }
            })
            .collect())
    }

    async fn terminate_instances(
        &self,
        instance_ids: &[String],
    ) -> AzResult<Vec<InstanceTransition>> {
        self.record(format!("terminate:{}", instance_ids.join(",")));
        Ok(instance_ids
            .iter()
            .map(|id| InstanceTransition {
                instance_id: id.clone(),
                previous_state: InstanceState::Running,
                current_state: InstanceState::Terminated,
            })
            .collect())
    }

    async fn start_instances(&self, instance_ids: &[String]) -> AzResult<Vec<InstanceTransition>> {
        self.record(format!("start:{}", instance_ids.join(",")));
        Ok(instance_ids
            .iter()
            .map(|id| InstanceTransition {
                instance_id: id.clone(),
                previous_state: InstanceState::Stopped,
                current_state: InstanceState::Pending,
            })
            .collect())
    }

    async fn cancel_spot_requests(&self, request_ids: &[String]) -> AzResult<()> {
        self.record(format!("cancel_spot:{}", request_ids.join(",")));
        Ok(())
    }

    async fn instance_state(&self, instance_id: &str) -> AzResult<InstanceState> {
        Ok(self
            .live_states
            .lock()
            .unwrap()
            .get(instance_id)
            .copied()
            .unwrap_or(InstanceState::Stopped))
    }

    async fn default_vpc_id(&self) -> AzResult<Option<String>> {
        Ok(self.default_vpc.clone())
    }
}

#[derive(Default)]
pub struct FakeAsg {
    pub groups: Mutex<Vec<AsgDetail>>,
    /// Group names the tag filter matches.
    pub tagged: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeAsg {
    pub fn with_groups(groups: Vec<AsgDetail>, tagged: Vec<String>) -> Self {
        Self {
            groups: Mutex::new(groups),
            tagged,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl AutoScalingApi for FakeAsg {
    async fn groups_by_names(&self, names: &[String]) -> AzResult<Vec<AsgDetail>> {
        let groups = self.groups.lock().unwrap();
        let mut out = Vec::new();
        for name in names {
            match groups.iter().find(|g| &g.name == name) {
                Some(g) => out.push(g.clone()),
                None => {
                    return Err(AzError::discovery(
                        Service::Asg,
                        format!("Auto Scaling group {name} not found"),
                    ))
                }
            }
        }
        Ok(out)
    }

    async fn group_names_by_tags(&self, _tags: &[Tag]) -> AzResult<Vec<String>> {
        Ok(self.tagged.clone())
    }

    async fn group_names_in_az(&self, az: &str) -> AzResult<Vec<String>> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.availability_zones.iter().any(|z| z == az))
            .map(|g| g.name.clone())
            .collect())
    }

    async fn set_capacity(&self, name: &str, min: i32, max: i32, desired: i32) -> AzResult<()> {
        self.record(format!("set_capacity:{name}:{min}:{max}:{desired}"));
        Ok(())
    }

    async fn set_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.record(format!("set_subnets:{name}:{}", subnet_ids.join(",")));
        Ok(())
    }

    async fn suspend_az_rebalance(&self, name: &str) -> AzResult<()> {
        self.record(format!("suspend_rebalance:{name}"));
        Ok(())
    }

    async fn resume_az_rebalance(&self, name: &str) -> AzResult<()> {
        self.record(format!("resume_rebalance:{name}"));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEks {
    pub clusters: HashMap<String, Vec<NodegroupDetail>>,
}

#[async_trait]
impl EksApi for FakeEks {
    async fn cluster_names_by_tags(&self, _tags: &[Tag]) -> AzResult<Vec<String>> {
        let mut names: Vec<String> = self.clusters.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn nodegroups(&self, cluster_name: &str) -> AzResult<Vec<NodegroupDetail>> {
        Ok(self.clusters.get(cluster_name).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeElb {
    pub lbs: Vec<ClassicLbDetail>,
    pub tags: HashMap<String, Vec<Tag>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeElb {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ClassicElbApi for FakeElb {
    async fn load_balancers(&self) -> AzResult<Vec<ClassicLbDetail>> {
        Ok(self.lbs.clone())
    }

    async fn tags_for(&self, names: &[String]) -> AzResult<HashMap<String, Vec<Tag>>> {
        Ok(names
            .iter()
            .filter_map(|n| self.tags.get(n).map(|t| (n.clone(), t.clone())))
            .collect())
    }

    async fn detach_from_subnets(
        &self,
        name: &str,
        subnet_ids: &[String],
    ) -> AzResult<Vec<String>> {
        self.record(format!("detach:{name}:{}", subnet_ids.join(",")));
        let lb = self.lbs.iter().find(|lb| lb.name == name).unwrap();
        Ok(lb
            .subnet_ids
            .iter()
            .filter(|s| !subnet_ids.contains(s))
            .cloned()
            .collect())
    }

    async fn attach_to_subnets(&self, name: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.record(format!("attach:{name}:{}", subnet_ids.join(",")));
        Ok(())
    }

    async fn disable_az(&self, name: &str, az: &str) -> AzResult<Vec<String>> {
        self.record(format!("disable_az:{name}:{az}"));
        let lb = self.lbs.iter().find(|lb| lb.name == name).unwrap();
        Ok(lb
            .availability_zones
            .iter()
            .filter(|z| z.as_str() != az)
            .cloned()
            .collect())
    }

    async fn enable_azs(&self, name: &str, azs: &[String]) -> AzResult<()> {
        self.record(format!("enable_azs:{name}:{}", azs.join(",")));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeElbV2 {
    pub lbs: Vec<LbV2Detail>,
    pub tags: HashMap<String, Vec<Tag>>,
    /// Number of ARNs received per `tags_for` call, for batching assertions.
    pub tag_batches: Mutex<Vec<usize>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeElbV2 {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ElbV2Api for FakeElbV2 {
    async fn load_balancers(&self) -> AzResult<Vec<LbV2Detail>> {
        Ok(self.lbs.clone())
    }

    async fn tags_for(&self, arns: &[String]) -> AzResult<HashMap<String, Vec<Tag>>> {
        self.tag_batches.lock().unwrap().push(arns.len());
        Ok(arns
            .iter()
            .filter_map(|a| self.tags.get(a).map(|t| (a.clone(), t.clone())))
            .collect())
    }

    async fn set_subnets(&self, arn: &str, subnet_ids: &[String]) -> AzResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_subnets:{arn}:{}", subnet_ids.join(",")));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRds {
    pub instances: Vec<DbInstanceInfo>,
    pub clusters: Vec<DbClusterInfo>,
    pub instance_azs: HashMap<String, String>,
    /// Identifiers whose mutation call reports an API failure.
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRds {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn mutate(&self, op: &str, id: &str) -> AzResult<()> {
        self.calls.lock().unwrap().push(format!("{op}:{id}"));
        if self.failing.contains(id) {
            return Err(AzError::api(
                Service::Rds,
                anyhow::anyhow!("simulated API failure for {id}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RdsApi for FakeRds {
    async fn db_instances(&self) -> AzResult<Vec<DbInstanceInfo>> {
        Ok(self.instances.clone())
    }

    async fn db_clusters(&self) -> AzResult<Vec<DbClusterInfo>> {
        Ok(self.clusters.clone())
    }

    async fn instance_az(&self, id: &str) -> AzResult<String> {
        self.instance_azs.get(id).cloned().ok_or_else(|| {
            AzError::discovery(Service::Rds, format!("DB instance {id} not found"))
        })
    }

    async fn reboot_with_failover(&self, id: &str) -> AzResult<()> {
        self.mutate("reboot", id)
    }

    async fn failover_cluster(&self, id: &str) -> AzResult<()> {
        self.mutate("failover", id)
    }
}

#[derive(Default)]
pub struct FakeCache {
    pub groups: Vec<ReplicationGroupInfo>,
    pub tags: HashMap<String, Vec<Tag>>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCache {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ElastiCacheApi for FakeCache {
    async fn replication_groups(&self) -> AzResult<Vec<ReplicationGroupInfo>> {
        Ok(self.groups.clone())
    }

    async fn tags_for(&self, arn: &str) -> AzResult<Vec<Tag>> {
        Ok(self.tags.get(arn).cloned().unwrap_or_default())
    }

    async fn test_failover(
        &self,
        replication_group_id: &str,
        node_group_id: &str,
    ) -> AzResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("test_failover:{replication_group_id}:{node_group_id}"));
        if self.failing.contains(replication_group_id) {
            return Err(AzError::api(
                Service::Elasticache,
                anyhow::anyhow!("simulated API failure for {replication_group_id}"),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMq {
    pub brokers: Vec<BrokerSummaryInfo>,
    pub tags: HashMap<String, HashMap<String, String>>,
    pub subnets: HashMap<String, Vec<String>>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeMq {
    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MqApi for FakeMq {
    async fn brokers(&self) -> AzResult<Vec<BrokerSummaryInfo>> {
        Ok(self.brokers.clone())
    }

    async fn tags_for(&self, arn: &str) -> AzResult<HashMap<String, String>> {
        Ok(self.tags.get(arn).cloned().unwrap_or_default())
    }

    async fn broker_subnet_ids(&self, broker_id: &str) -> AzResult<Vec<String>> {
        Ok(self.subnets.get(broker_id).cloned().unwrap_or_default())
    }

    async fn reboot_broker(&self, broker_id: &str) -> AzResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("reboot:{broker_id}"));
        if self.failing.contains(broker_id) {
            return Err(AzError::api(
                Service::Mq,
                anyhow::anyhow!("simulated API failure for {broker_id}"),
            ));
        }
        Ok(())
    }
}

/// Builders for commonly used fixture shapes.
pub fn subnet(id: &str, vpc: &str, az: &str) -> SubnetInfo {
    SubnetInfo {
        subnet_id: id.to_string(),
        vpc_id: vpc.to_string(),
        availability_zone: az.to_string(),
    }
}

pub fn asg_detail(name: &str, azs: &[&str], subnets: &[&str]) -> AsgDetail {
    AsgDetail {
        name: name.to_string(),
        availability_zones: azs.iter().map(ToString::to_string).collect(),
        subnet_ids: subnets.iter().map(ToString::to_string).collect(),
        min_size: 5,
        max_size: 10,
        desired_capacity: 7,
        az_rebalance_suspended: false,
        instance_ids: Vec::new(),
    }
}

pub fn cache_node_group(id: &str, members: Vec<(&str, &str, bool)>) -> CacheNodeGroup {
    CacheNodeGroup {
        node_group_id: id.to_string(),
        members: members
            .into_iter()
            .map(|(cluster, az, primary)| azfail_aws::api::CacheMember {
                cache_cluster_id: cluster.to_string(),
                cache_node_id: "0001".to_string(),
                preferred_availability_zone: Some(az.to_string()),
                is_primary: primary,
            })
            .collect(),
    }
}

pub fn broker(id: &str, name: &str, mode: BrokerDeployment) -> BrokerSummaryInfo {
    BrokerSummaryInfo {
        id: id.to_string(),
        arn: format!("arn:aws:mq:{id}"),
        name: name.to_string(),
        engine_type: "ActiveMQ".to_string(),
        deployment_mode: mode,
    }
}
