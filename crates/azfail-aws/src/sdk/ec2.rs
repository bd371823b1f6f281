use async_trait::async_trait;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types as ec2t;
use aws_sdk_ec2::Client;

use azfail_core::{AzError, AzResult, Service, Tag};

use crate::api::{
    Ec2Api, EntryOutcome, InstanceInfo, InstanceLifecycle, InstanceState, InstanceTransition,
    NaclAssociation, NetworkAclInfo, SpotRequestInfo, SpotRequestKind, SubnetInfo,
};

/// Sentinel tag marking a NACL as one of ours, so repeated runs recognize
/// already-blackholed subnets and rollback knows what it may delete.
const BLACKHOLE_TAG_KEY: &str = "Name";
const BLACKHOLE_TAG_VALUE: &str = "blackhole_nacl";

pub struct Ec2Sdk {
    client: Client,
}

impl Ec2Sdk {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn api_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> AzError {
    AzError::api(Service::Ec2, e)
}

fn tag_filters(tags: &[Tag]) -> Vec<ec2t::Filter> {
    tags.iter()
        .map(|t| {
            ec2t::Filter::builder()
                .name(format!("tag:{}", t.key))
                .values(&t.value)
                .build()
        })
        .collect()
}

fn map_state(name: &str) -> AzResult<InstanceState> {
    match name {
        "pending" => Ok(InstanceState::Pending),
        "running" => Ok(InstanceState::Running),
        "shutting-down" => Ok(InstanceState::ShuttingDown),
        "terminated" => Ok(InstanceState::Terminated),
        "stopping" => Ok(InstanceState::Stopping),
        "stopped" => Ok(InstanceState::Stopped),
        other => Err(AzError::api(
            Service::Ec2,
            anyhow::anyhow!("unrecognized instance state {other:?}"),
        )),
    }
}

fn map_transition(change: &ec2t::InstanceStateChange) -> AzResult<InstanceTransition> {
    let previous = change
        .previous_state()
        .and_then(|s| s.name())
        .map(|n| map_state(n.as_str()))
        .transpose()?
        .unwrap_or(InstanceState::Running);
    let current = change
        .current_state()
        .and_then(|s| s.name())
        .map(|n| map_state(n.as_str()))
        .transpose()?
        .unwrap_or(InstanceState::Stopping);
    Ok(InstanceTransition {
        instance_id: change.instance_id().unwrap_or_default().to_string(),
        previous_state: previous,
        current_state: current,
    })
}

fn map_transitions(changes: &[ec2t::InstanceStateChange]) -> AzResult<Vec<InstanceTransition>> {
    changes.iter().map(map_transition).collect()
}

#[async_trait]
impl Ec2Api for Ec2Sdk {
    async fn subnets(
        &self,
        az: Option<&str>,
        tags: &[Tag],
        subnet_ids: &[String],
    ) -> AzResult<Vec<SubnetInfo>> {
        let mut req = self.client.describe_subnets();
        if let Some(az) = az {
            req = req.filters(
                ec2t::Filter::builder()
                    .name("availability-zone")
                    .values(az)
                    .build(),
            );
        }
        for filter in tag_filters(tags) {
            req = req.filters(filter);
        }
        if !subnet_ids.is_empty() {
            req = req.set_subnet_ids(Some(subnet_ids.to_vec()));
        }

        let mut pages = req.into_paginator().send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for subnet in page.subnets() {
                out.push(SubnetInfo {
                    subnet_id: subnet.subnet_id().unwrap_or_default().to_string(),
                    vpc_id: subnet.vpc_id().unwrap_or_default().to_string(),
                    availability_zone: subnet
                        .availability_zone()
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
        Ok(out)
    }

    async fn network_acls_for_subnets(
        &self,
        vpc_id: &str,
        subnet_ids: &[String],
    ) -> AzResult<Vec<NetworkAclInfo>> {
        let mut pages = self
            .client
            .describe_network_acls()
            .filters(ec2t::Filter::builder().name("vpc-id").values(vpc_id).build())
            .filters(
                ec2t::Filter::builder()
                    .name("association.subnet-id")
                    .set_values(Some(subnet_ids.to_vec()))
                    .build(),
            )
            .into_paginator()
            .send();

        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for acl in page.network_acls() {
                let is_blackhole = acl.tags().iter().any(|t| {
                    t.key() == Some(BLACKHOLE_TAG_KEY) && t.value() == Some(BLACKHOLE_TAG_VALUE)
                });
                let associations = acl
                    .associations()
                    .iter()
                    .map(|a| NaclAssociation {
                        association_id: a
                            .network_acl_association_id()
                            .unwrap_or_default()
                            .to_string(),
                        network_acl_id: a.network_acl_id().unwrap_or_default().to_string(),
                        subnet_id: a.subnet_id().unwrap_or_default().to_string(),
                    })
                    .collect();
                out.push(NetworkAclInfo {
                    network_acl_id: acl.network_acl_id().unwrap_or_default().to_string(),
                    vpc_id: acl.vpc_id().unwrap_or_default().to_string(),
                    is_blackhole,
                    associations,
                });
            }
        }
        Ok(out)
    }

    async fn create_blackhole_acl(&self, vpc_id: &str) -> AzResult<String> {
        let resp = self
            .client
            .create_network_acl()
            .vpc_id(vpc_id)
            .tag_specifications(
                ec2t::TagSpecification::builder()
                    .resource_type(ec2t::ResourceType::NetworkAcl)
                    .tags(
                        ec2t::Tag::builder()
                            .key(BLACKHOLE_TAG_KEY)
                            .value(BLACKHOLE_TAG_VALUE)
                            .build(),
                    )
                    .build(),
            )
            .send()
            .await
            .map_err(api_err)?;
        resp.network_acl()
            .and_then(|acl| acl.network_acl_id())
            .map(ToString::to_string)
            .ok_or_else(|| {
                AzError::api(
                    Service::Ec2,
                    anyhow::anyhow!("CreateNetworkAcl returned no ACL id"),
                )
            })
    }

    async fn create_deny_all_entry(
        &self,
        acl_id: &str,
        rule_number: i32,
        egress: bool,
    ) -> AzResult<EntryOutcome> {
        let result = self
            .client
            .create_network_acl_entry()
            .network_acl_id(acl_id)
            .rule_number(rule_number)
            .protocol("-1")
            .rule_action(ec2t::RuleAction::Deny)
            .egress(egress)
            .cidr_block("0.0.0.0/0")
            .port_range(ec2t::PortRange::builder().from(0).to(65535).build())
            .send()
            .await;
        match result {
            Ok(_) => Ok(EntryOutcome::Created),
            Err(e) if e.code() == Some("NetworkAclEntryAlreadyExists") => {
                Ok(EntryOutcome::RuleNumberTaken)
            }
            Err(e) => Err(api_err(e)),
        }
    }

    async fn replace_network_acl_association(
        &self,
        association_id: &str,
        acl_id: &str,
    ) -> AzResult<String> {
        let resp = self
            .client
            .replace_network_acl_association()
            .association_id(association_id)
            .network_acl_id(acl_id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp.new_association_id().unwrap_or_default().to_string())
    }

    async fn delete_network_acl(&self, acl_id: &str) -> AzResult<()> {
        self.client
            .delete_network_acl()
            .network_acl_id(acl_id)
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn instances(
        &self,
        az: &str,
        tags: &[Tag],
        instance_ids: &[String],
        states: &[InstanceState],
    ) -> AzResult<Vec<InstanceInfo>> {
        let state_names: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
        let mut req = self
            .client
            .describe_instances()
            .filters(
                ec2t::Filter::builder()
                    .name("availability-zone")
                    .values(az)
                    .build(),
            )
            .filters(
                ec2t::Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(state_names))
                    .build(),
            );
        for filter in tag_filters(tags) {
            req = req.filters(filter);
        }
        if !instance_ids.is_empty() {
            req = req.set_instance_ids(Some(instance_ids.to_vec()));
        }

        let mut pages = req.into_paginator().send();
        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_err)?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let lifecycle = match instance.instance_lifecycle() {
                        None => InstanceLifecycle::Normal,
                        Some(ec2t::InstanceLifecycleType::Spot) => InstanceLifecycle::Spot,
                        Some(_) => InstanceLifecycle::Scheduled,
                    };
                    let state = instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| map_state(n.as_str()))
                        .transpose()?
                        .unwrap_or(InstanceState::Running);
                    out.push(InstanceInfo {
                        instance_id: instance.instance_id().unwrap_or_default().to_string(),
                        lifecycle,
                        state,
                        spot_request_id: instance
                            .spot_instance_request_id()
                            .map(ToString::to_string),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn spot_requests(&self, request_ids: &[String]) -> AzResult<Vec<SpotRequestInfo>> {
        let resp = self
            .client
            .describe_spot_instance_requests()
            .set_spot_instance_request_ids(Some(request_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        let mut out = Vec::new();
        for request in resp.spot_instance_requests() {
            let kind = match request.r#type() {
                Some(ec2t::SpotInstanceType::Persistent) => SpotRequestKind::Persistent,
                _ => SpotRequestKind::OneTime,
            };
            out.push(SpotRequestInfo {
                request_id: request
                    .spot_instance_request_id()
                    .unwrap_or_default()
                    .to_string(),
                instance_id: request.instance_id().unwrap_or_default().to_string(),
                kind,
            });
        }
        Ok(out)
    }

    async fn stop_instances(
        &self,
        instance_ids: &[String],
        force: bool,
    ) -> AzResult<Vec<InstanceTransition>> {
        let resp = self
            .client
            .stop_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .force(force)
            .send()
            .await
            .map_err(api_err)?;
        map_transitions(resp.stopping_instances())
    }

    async fn terminate_instances(
        &self,
        instance_ids: &[String],
    ) -> AzResult<Vec<InstanceTransition>> {
        let resp = self
            .client
            .terminate_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        map_transitions(resp.terminating_instances())
    }

    async fn start_instances(&self, instance_ids: &[String]) -> AzResult<Vec<InstanceTransition>> {
        let resp = self
            .client
            .start_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        map_transitions(resp.starting_instances())
    }

    async fn cancel_spot_requests(&self, request_ids: &[String]) -> AzResult<()> {
        self.client
            .cancel_spot_instance_requests()
            .set_spot_instance_request_ids(Some(request_ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn instance_state(&self, instance_id: &str) -> AzResult<InstanceState> {
        let resp = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(api_err)?;
        resp.reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .map(|n| map_state(n.as_str()))
            .transpose()?
            .ok_or_else(|| {
                AzError::api(
                    Service::Ec2,
                    anyhow::anyhow!("instance {instance_id} not found"),
                )
            })
    }

    async fn default_vpc_id(&self) -> AzResult<Option<String>> {
        let resp = self
            .client
            .describe_vpcs()
            .filters(
                ec2t::Filter::builder()
                    .name("isDefault")
                    .values("true")
                    .build(),
            )
            .send()
            .await
            .map_err(api_err)?;
        Ok(resp
            .vpcs()
            .first()
            .and_then(|v| v.vpc_id())
            .map(ToString::to_string))
    }
}
