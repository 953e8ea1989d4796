//! Controller reconciliation and audit passes against a fake cluster API.

mod support;

use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use support::fake_api::FakeCluster;
use support::resources::{make_resource, owner_template_spec};
use warden::api;
use warden::audit;
use warden::cluster::{ClientOptions, ClusterClient};
use warden::controller;
use warden::manager::{Manager, ManagerOptions};
use warden::policy::{Backend, ClusterValidationTarget, Driver, PolicyClient};
use warden::scheme::Scheme;
use warden::watch::{WatchLifetime, WatchManager};

fn policy_client() -> PolicyClient {
    Backend::new(Driver::local())
        .unwrap()
        .client(ClusterValidationTarget::default())
        .unwrap()
}

#[tokio::test]
async fn controller_marks_resources_and_compiles_templates() {
    let cluster = FakeCluster::start().await;
    cluster.seed(
        &api::TEMPLATES,
        make_resource(&api::TEMPLATES, "require-owner", &[], owner_template_spec()),
    );
    cluster.seed(
        &api::SYNC_SETS,
        make_resource(
            &api::SYNC_SETS,
            "team-sync",
            &[],
            json!({ "syncKinds": ["PolicyTemplate"] }),
        ),
    );

    let mut manager = Manager::new(cluster.config(), ManagerOptions::default()).unwrap();
    api::register_types(manager.scheme_mut()).unwrap();

    let policy = policy_client();
    let (lifetime, lifetime_rx) = WatchLifetime::new();
    let watches = WatchManager::new(lifetime_rx, cluster.config());

    controller::register_into(
        &mut manager,
        policy.clone(),
        watches.clone(),
        Duration::from_millis(20),
    )
    .unwrap();

    let (tx, shutdown) = watch::channel(false);
    let run = tokio::spawn(async move { manager.run(shutdown).await });

    // Let a few resync passes happen, then stop the run loop.
    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(true).unwrap();
    run.await.unwrap().unwrap();
    lifetime.cancel();

    let template = cluster.get(&api::TEMPLATES, "require-owner").unwrap();
    assert!(template.has_finalizer(api::TEMPLATE_FINALIZER));

    let sync_set = cluster.get(&api::SYNC_SETS, "team-sync").unwrap();
    assert!(sync_set.has_finalizer(api::SYNC_FINALIZER));

    assert_eq!(policy.template_names(), vec!["require-owner"]);

    let watched = watches.watched_kinds();
    assert!(watched.contains(&"PolicyTemplate".to_string()));
    assert!(watched.contains(&"SyncSet".to_string()));
}

#[tokio::test]
async fn audit_pass_reports_violations_for_nonconforming_resources() {
    let cluster = FakeCluster::start().await;
    cluster.seed(
        &api::SYNC_SETS,
        make_resource(&api::SYNC_SETS, "unowned", &[], json!({})),
    );
    cluster.seed(
        &api::SYNC_SETS,
        make_resource(&api::SYNC_SETS, "owned", &[], json!({ "owner": "platform" })),
    );

    let policy = policy_client();
    policy
        .upsert_template("require-owner", &owner_template_spec())
        .unwrap();

    let client = ClusterClient::new(&cluster.config(), ClientOptions::default()).unwrap();
    let mut scheme = Scheme::new();
    api::register_types(&mut scheme).unwrap();

    let summary = audit::audit_pass(&client, &scheme, &policy).await;
    assert_eq!(summary.kinds_scanned, 1);
    assert_eq!(summary.resources_scanned, 2);
    assert_eq!(summary.violations, 1);
}

#[tokio::test]
async fn audit_pass_with_no_templates_scans_nothing() {
    let cluster = FakeCluster::start().await;
    let policy = policy_client();
    let client = ClusterClient::new(&cluster.config(), ClientOptions::default()).unwrap();
    let mut scheme = Scheme::new();
    api::register_types(&mut scheme).unwrap();

    let summary = audit::audit_pass(&client, &scheme, &policy).await;
    assert_eq!(summary, audit::AuditSummary::default());
}
