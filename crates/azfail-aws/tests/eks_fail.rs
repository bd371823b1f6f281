mod common;

use std::collections::HashMap;

use azfail_aws::api::NodegroupDetail;
use azfail_aws::eks;
use azfail_core::{FailureMode, FailureRequest};
use tempfile::TempDir;

use common::{asg_detail, subnet, FakeAsg, FakeEc2, FakeEks};

fn request(dir: &TempDir, dry_run: bool) -> FailureRequest {
    FailureRequest::new("ap-southeast-1a", dry_run)
        .with_failure_mode(FailureMode::Network)
        .with_state_path(dir.path().join("fail_az"))
}

fn fixture() -> (FakeEks, FakeAsg, FakeEc2) {
    let eks_api = FakeEks {
        clusters: HashMap::from([(
            "prod".to_string(),
            vec![NodegroupDetail {
                name: "workers".to_string(),
                asg_names: vec!["eks-workers".to_string()],
                subnet_ids: vec!["subnet-1".to_string(), "subnet-2".to_string()],
            }],
        )]),
    };
    let asg_api = FakeAsg::with_groups(
        vec![asg_detail(
            "eks-workers",
            &["ap-southeast-1a", "ap-southeast-1b"],
            &["subnet-1", "subnet-2"],
        )],
        Vec::new(),
    );
    let ec2 = FakeEc2 {
        subnets: vec![
            subnet("subnet-1", "vpc-1", "ap-southeast-1a"),
            subnet("subnet-2", "vpc-1", "ap-southeast-1b"),
        ],
        nacls: vec![azfail_aws::api::NetworkAclInfo {
            network_acl_id: "acl-main".to_string(),
            vpc_id: "vpc-1".to_string(),
            is_blackhole: false,
            associations: vec![azfail_aws::api::NaclAssociation {
                association_id: "aclassoc-1".to_string(),
                network_acl_id: "acl-main".to_string(),
                subnet_id: "subnet-1".to_string(),
            }],
        }],
        ..Default::default()
    };
    (eks_api, asg_api, ec2)
}

#[tokio::test]
async fn nodegroup_asgs_and_subnets_fail_together() {
    let dir = TempDir::new().unwrap();
    let (eks_api, asg_api, ec2) = fixture();

    let doc = eks::fail_az(&eks_api, &asg_api, &ec2, &request(&dir, false))
        .await
        .unwrap();

    let cluster = &doc.state.clusters[0];
    assert_eq!(cluster.cluster_name, "prod");
    let nodegroup = &cluster.node_groups[0];
    assert_eq!(nodegroup.auto_scaling_groups.len(), 1);
    assert_eq!(
        nodegroup.auto_scaling_groups[0].after.subnet_ids,
        Some(vec!["subnet-2".to_string()])
    );
    assert_eq!(nodegroup.subnets.len(), 1);
    assert_eq!(nodegroup.subnets[0].subnet_id, "subnet-1");

    assert_eq!(
        asg_api.log(),
        vec![
            "suspend_rebalance:eks-workers".to_string(),
            "set_subnets:eks-workers:subnet-2".to_string(),
        ]
    );
    assert!(ec2.log().iter().any(|l| l.starts_with("create_blackhole:vpc-1")));
}

#[tokio::test]
async fn rollback_restores_asgs_and_nacls() {
    let dir = TempDir::new().unwrap();
    let (eks_api, asg_api, ec2) = fixture();
    let req = request(&dir, false);

    eks::fail_az(&eks_api, &asg_api, &ec2, &req).await.unwrap();
    asg_api.calls.lock().unwrap().clear();
    ec2.calls.lock().unwrap().clear();

    let state_file = dir.path().join("fail_az.eks.json");
    eks::recover_az(&eks_api, &asg_api, &ec2, &state_file)
        .await
        .unwrap();
    assert!(!state_file.exists());
    assert_eq!(
        asg_api.log(),
        vec![
            "resume_rebalance:eks-workers".to_string(),
            "set_subnets:eks-workers:subnet-1,subnet-2".to_string(),
        ]
    );
    let ec2_log = ec2.log();
    assert!(ec2_log.iter().any(|l| l.starts_with("replace_assoc:") && l.ends_with("->acl-main")));
    assert!(ec2_log.iter().any(|l| l.starts_with("delete_acl:")));
}
