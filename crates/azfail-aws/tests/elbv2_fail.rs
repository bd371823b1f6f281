mod common;

use azfail_aws::api::{LbKind, LbV2Detail, LbZone};
use azfail_aws::elbv2;
use azfail_core::{AzError, FailureRequest, Tag};
use tempfile::TempDir;

use common::{marker_tags, FakeElbV2};

fn request(dir: &TempDir, dry_run: bool) -> FailureRequest {
    FailureRequest::new("ap-southeast-1a", dry_run)
        .with_tags(marker_tags())
        .with_state_path(dir.path().join("fail_az"))
}

fn lb(name: &str, kind: LbKind, zones: &[(&str, &str)]) -> LbV2Detail {
    LbV2Detail {
        name: name.to_string(),
        arn: format!("arn:aws:elbv2:{name}"),
        kind,
        zones: zones
            .iter()
            .map(|(zone, subnet)| LbZone {
                zone_name: zone.to_string(),
                subnet_id: subnet.to_string(),
            })
            .collect(),
        active: true,
    }
}

fn fake_with(lbs: Vec<LbV2Detail>) -> FakeElbV2 {
    let tags = lbs
        .iter()
        .map(|lb| (lb.arn.clone(), vec![Tag::failure_marker()]))
        .collect();
    FakeElbV2 {
        lbs,
        tags,
        ..Default::default()
    }
}

#[tokio::test]
async fn three_az_alb_drops_to_the_complement() {
    let dir = TempDir::new().unwrap();
    let api = fake_with(vec![lb(
        "web",
        LbKind::Application,
        &[
            ("ap-southeast-1a", "subnet-1"),
            ("ap-southeast-1b", "subnet-2"),
            ("ap-southeast-1c", "subnet-3"),
        ],
    )]);

    let doc = elbv2::fail_az(&api, &request(&dir, false)).await.unwrap();

    let record = &doc.state.load_balancers[0];
    assert_eq!(
        record.before.subnet_ids,
        vec!["subnet-1", "subnet-2", "subnet-3"]
    );
    assert_eq!(record.after.subnet_ids, vec!["subnet-2", "subnet-3"]);
    assert_eq!(
        api.log(),
        vec!["set_subnets:arn:aws:elbv2:web:subnet-2,subnet-3".to_string()]
    );
}

#[tokio::test]
async fn two_az_alb_is_rejected_untouched() {
    let dir = TempDir::new().unwrap();
    let api = fake_with(vec![lb(
        "small",
        LbKind::Application,
        &[
            ("ap-southeast-1a", "subnet-1"),
            ("ap-southeast-1b", "subnet-2"),
        ],
    )]);

    let err = elbv2::fail_az(&api, &request(&dir, false)).await.unwrap_err();
    assert!(matches!(err, AzError::Unsupported { .. }));
    assert!(api.log().is_empty());
}

#[tokio::test]
async fn network_lb_fails_instead_of_being_skipped() {
    let dir = TempDir::new().unwrap();
    let api = fake_with(vec![lb(
        "nlb",
        LbKind::Network,
        &[
            ("ap-southeast-1a", "subnet-1"),
            ("ap-southeast-1b", "subnet-2"),
            ("ap-southeast-1c", "subnet-3"),
        ],
    )]);

    let err = elbv2::fail_az(&api, &request(&dir, false)).await.unwrap_err();
    assert!(matches!(err, AzError::Unsupported { .. }));
    assert!(api.log().is_empty());
}

#[tokio::test]
async fn rollback_restores_the_recorded_subnets() {
    let dir = TempDir::new().unwrap();
    let api = fake_with(vec![lb(
        "web",
        LbKind::Application,
        &[
            ("ap-southeast-1a", "subnet-1"),
            ("ap-southeast-1b", "subnet-2"),
            ("ap-southeast-1c", "subnet-3"),
        ],
    )]);
    let req = request(&dir, false);

    elbv2::fail_az(&api, &req).await.unwrap();
    api.calls.lock().unwrap().clear();

    let state_file = dir.path().join("fail_az.elbv2.json");
    elbv2::recover_az(&api, &state_file).await.unwrap();
    assert!(!state_file.exists());
    assert_eq!(
        api.log(),
        vec!["set_subnets:arn:aws:elbv2:web:subnet-1,subnet-2,subnet-3".to_string()]
    );
}

#[tokio::test]
async fn tag_lookups_are_chunked_and_merged() {
    let dir = TempDir::new().unwrap();
    let lbs: Vec<LbV2Detail> = (0..25)
        .map(|i| {
            lb(
                &format!("web-{i:02}"),
                LbKind::Application,
                &[
                    ("ap-southeast-1a", "subnet-1"),
                    ("ap-southeast-1b", "subnet-2"),
                    ("ap-southeast-1c", "subnet-3"),
                ],
            )
        })
        .collect();
    let api = fake_with(lbs);

    let doc = elbv2::fail_az(&api, &request(&dir, false)).await.unwrap();

    // 25 ARNs against the describe-tags cap of 20 per call.
    assert_eq!(*api.tag_batches.lock().unwrap(), vec![20, 5]);
    assert_eq!(doc.state.load_balancers.len(), 25);
    assert_eq!(api.log().len(), 25);
}

#[tokio::test]
async fn untagged_lb_is_not_touched() {
    let dir = TempDir::new().unwrap();
    let mut api = fake_with(vec![lb(
        "web",
        LbKind::Application,
        &[
            ("ap-southeast-1a", "subnet-1"),
            ("ap-southeast-1b", "subnet-2"),
            ("ap-southeast-1c", "subnet-3"),
        ],
    )]);
    api.tags.clear();

    let err = elbv2::fail_az(&api, &request(&dir, false)).await.unwrap_err();
    assert!(matches!(err, AzError::Discovery { .. }));
    assert!(api.log().is_empty());
}
