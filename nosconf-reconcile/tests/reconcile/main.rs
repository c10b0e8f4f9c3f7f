//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock as Lazy, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use maplit::btreemap;
use nosconf_gnmi::test::MockDevice;
use nosconf_gnmi::{Capabilities, Client, Entity};
use nosconf_reconcile::{
    Error, MarkerStore, MemoryStore, Reconciler, Report, StaticResolver, Step,
    StepErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Instant;

static VERSIONS: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    btreemap! {
        "/etc/nosconf/banner.txt".to_owned() => "1".to_owned(),
    }
});

//
// Test step writing one subtree.
//

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct Leaf {
    #[serde(skip)]
    path: String,
    value: Value,
}

impl PartialEq for Leaf {
    fn eq(&self, other: &Leaf) -> bool {
        self.value == other.value
    }
}

impl Entity for Leaf {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn marshal(&self, _caps: &Capabilities) -> Result<Value, serde_json::Error> {
        Ok(self.value.clone())
    }

    fn unmarshal(
        &mut self,
        _caps: &Capabilities,
        value: Value,
    ) -> Result<(), serde_json::Error> {
        self.value = value;
        Ok(())
    }
}

struct LeafStep {
    name: String,
    leaf: Leaf,
    deps: Vec<String>,
    runs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Step for LeafStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> Result<Value, serde_json::Error> {
        Ok(json!({"path": self.leaf.path, "value": self.leaf.value}))
    }

    fn deps(&self) -> Vec<String> {
        self.deps.clone()
    }

    async fn exec(
        &self,
        deadline: Instant,
        client: &Client,
    ) -> Result<(), nosconf_gnmi::Error> {
        self.runs.lock().unwrap().push(self.name.clone());
        client.update(deadline, &[&self.leaf]).await
    }
}

//
// Helper functions.
//

#[derive(Debug, Default)]
struct Fixture {
    device: MockDevice,
    store: MemoryStore,
    resolver: StaticResolver,
    runs: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Fixture {
        Fixture {
            resolver: StaticResolver::new(VERSIONS.clone()),
            device: MockDevice::nxos(),
            ..Default::default()
        }
    }

    fn step(&self, name: &str, path: &str, value: Value) -> Box<dyn Step> {
        self.step_with_deps(name, path, value, &[])
    }

    fn step_with_deps(
        &self,
        name: &str,
        path: &str,
        value: Value,
        deps: &[&str],
    ) -> Box<dyn Step> {
        Box::new(LeafStep {
            name: name.to_owned(),
            leaf: Leaf {
                path: path.to_owned(),
                value,
            },
            deps: deps.iter().map(|dep| dep.to_string()).collect(),
            runs: self.runs.clone(),
        })
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), self.resolver.clone())
    }

    async fn client(&self) -> Client {
        let deadline = Instant::now() + Duration::from_secs(5);
        Client::connect(self.device.clone(), deadline)
            .await
            .expect("failed to negotiate capabilities")
    }

    fn runs(&self) -> Vec<String> {
        std::mem::take(&mut *self.runs.lock().unwrap())
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

//
// Tests.
//

#[tokio::test]
async fn reconcile_idempotent() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();
    let steps = vec![
        fixture.step("hostname", "System/name", json!({"name": "leaf-1"})),
        fixture.step(
            "vlan-10",
            "System/bd-items/bd-items/BD-list[fabEncap=vlan-10]",
            json!({"fabEncap": "vlan-10", "name": "servers"}),
        ),
    ];

    let report = reconciler.run(&client, &steps).await.unwrap();
    assert_eq!(
        report,
        Report {
            executed: names(&["hostname", "vlan-10"]),
            skipped: vec![],
        }
    );
    assert_eq!(fixture.runs(), names(&["hostname", "vlan-10"]));
    assert_eq!(fixture.device.set_requests().len(), 2);
    assert_eq!(
        fixture.device.config("System/name"),
        Some(json!({"name": "leaf-1"}))
    );

    // Nothing changed: no step runs and the device isn't touched.
    let report = reconciler.run(&client, &steps).await.unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(report.skipped, names(&["hostname", "vlan-10"]));
    assert!(fixture.runs().is_empty());
    assert_eq!(fixture.device.set_requests().len(), 2);
}

#[tokio::test]
async fn reconcile_changed_step() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();

    let steps = vec![
        fixture.step("hostname", "System/name", json!({"name": "leaf-1"})),
        fixture.step("domain", "System/dns-items", json!({"domain": "lab"})),
    ];
    reconciler.run(&client, &steps).await.unwrap();
    fixture.runs();

    let steps = vec![
        fixture.step("hostname", "System/name", json!({"name": "leaf-2"})),
        fixture.step("domain", "System/dns-items", json!({"domain": "lab"})),
    ];
    let report = reconciler.run(&client, &steps).await.unwrap();
    assert_eq!(report.executed, names(&["hostname"]));
    assert_eq!(report.skipped, names(&["domain"]));
    assert_eq!(fixture.runs(), names(&["hostname"]));
    assert_eq!(
        fixture.device.config("System/name"),
        Some(json!({"name": "leaf-2"}))
    );
}

#[tokio::test]
async fn reconcile_partial_failure() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();
    let steps = vec![
        fixture.step("a", "System/name", json!({"name": "leaf-1"})),
        fixture.step("b", "System/bd-items[", json!({})),
        fixture.step("c", "System/dns-items", json!({"domain": "lab"})),
    ];

    let error = reconciler.run(&client, &steps).await.unwrap_err();
    let Error::Steps(errors) = &error;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name, "b");
    assert!(matches!(
        errors[0].kind,
        StepErrorKind::Exec(nosconf_gnmi::Error::Path(..))
    ));
    assert!(error.to_string().contains("step b failed"));

    // Steps after the failing one still ran and were recorded.
    assert_eq!(fixture.runs(), names(&["a", "b", "c"]));
    let markers = fixture.store.markers();
    assert!(markers.contains_key("a"));
    assert!(!markers.contains_key("b"));
    assert!(markers.contains_key("c"));

    // Only the failed step is retried.
    let error = reconciler.run(&client, &steps).await.unwrap_err();
    assert_eq!(error.steps().len(), 1);
    assert_eq!(fixture.runs(), names(&["b"]));
}

#[tokio::test]
async fn reconcile_dependency_version() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();
    let steps = vec![
        fixture.step_with_deps(
            "banner",
            "System/userext-items/preloginbanner-items",
            json!({"text": "Authorized access only"}),
            &["/etc/nosconf/banner.txt"],
        ),
        fixture.step("hostname", "System/name", json!({"name": "leaf-1"})),
    ];

    reconciler.run(&client, &steps).await.unwrap();
    let report = reconciler.run(&client, &steps).await.unwrap();
    assert!(report.executed.is_empty());
    fixture.runs();

    fixture.resolver.set("/etc/nosconf/banner.txt", "2");
    let report = reconciler.run(&client, &steps).await.unwrap();
    assert_eq!(report.executed, names(&["banner"]));
    assert_eq!(report.skipped, names(&["hostname"]));
    assert_eq!(fixture.runs(), names(&["banner"]));
}

#[tokio::test]
async fn reconcile_unknown_dependency() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();
    let steps = vec![fixture.step_with_deps(
        "banner",
        "System/userext-items/preloginbanner-items",
        json!({"text": "Authorized access only"}),
        &["/etc/nosconf/motd.txt"],
    )];

    let error = reconciler.run(&client, &steps).await.unwrap_err();
    assert!(matches!(
        error.steps()[0].kind,
        StepErrorKind::Dependency(ref dep, _) if dep == "/etc/nosconf/motd.txt"
    ));
    assert!(fixture.runs().is_empty());
    assert_eq!(fixture.store.get("banner"), None);
}

#[tokio::test]
async fn reconcile_already_converged_device() {
    let fixture = Fixture::new();
    fixture
        .device
        .insert_config("System/name", json!({"name": "leaf-1"}));
    let client = fixture.client().await;
    let reconciler = fixture.reconciler();
    let steps = vec![fixture.step(
        "hostname",
        "System/name",
        json!({"name": "leaf-1"}),
    )];

    // The step runs once to record its marker, but nothing is written.
    let report = reconciler.run(&client, &steps).await.unwrap();
    assert_eq!(report.executed, names(&["hostname"]));
    assert!(fixture.device.set_requests().is_empty());
    assert!(fixture.store.get("hostname").is_some());
}

#[tokio::test]
async fn reconcile_step_timeout() {
    let fixture = Fixture::new();
    let client = fixture.client().await;
    fixture.device.set_delay(Duration::from_millis(500));
    let reconciler = fixture
        .reconciler()
        .with_timeout(Duration::from_millis(20));
    let steps = vec![fixture.step(
        "hostname",
        "System/name",
        json!({"name": "leaf-1"}),
    )];

    let error = reconciler.run(&client, &steps).await.unwrap_err();
    match &error.steps()[0].kind {
        StepErrorKind::Exec(nosconf_gnmi::Error::Transport(status)) => {
            assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
        }
        kind => panic!("unexpected error: {kind:?}"),
    }
    assert_eq!(fixture.store.get("hostname"), None);
}
