//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use nosconf_gnmi::Entity;
use nosconf_gnmi::test::MockDevice;
use serde_json::json;

use super::{
    Banner, Hostname, PhysIf, bd, connect, deadline, update_path,
    update_value,
};

#[tokio::test]
async fn delete_resets_to_default() {
    let device = MockDevice::nxos();
    let banner_path = "System/userext-items/preloginbanner-items";
    device.insert_config(banner_path, json!({"text": "Authorized only"}));
    let client = connect(&device).await;

    let banner = Banner {
        text: "Authorized only".to_owned(),
    };
    client.delete(deadline(), &[&banner]).await.unwrap();

    // Deletes never read the device first.
    assert!(device.get_requests().is_empty());
    let requests = device.set_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.delete.is_empty());
    assert!(request.update.is_empty());
    assert_eq!(request.replace.len(), 1);
    assert_eq!(update_path(&request.replace[0]), banner_path);
    assert_eq!(
        update_value(&request.replace[0]),
        json!({"text": "User Access Verification"})
    );
    assert_eq!(
        device.config(banner_path),
        Some(json!({"text": "User Access Verification"}))
    );
}

#[tokio::test]
async fn delete_without_default() {
    let device = MockDevice::nxos();
    device.insert_config("System/name", json!({"name": "leaf-1"}));
    let client = connect(&device).await;

    let hostname = Hostname {
        name: "leaf-1".to_owned(),
    };
    client.delete(deadline(), &[&hostname]).await.unwrap();

    let requests = device.set_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].replace.is_empty());
    assert!(requests[0].update.is_empty());
    assert_eq!(requests[0].delete.len(), 1);
    assert_eq!(device.config("System/name"), None);
}

#[tokio::test]
async fn delete_list_item() {
    let device = MockDevice::nxos();
    let vlan = bd("vlan-10", "servers");
    device.insert_config(&vlan.path(), json!({"fabEncap": "vlan-10"}));
    let client = connect(&device).await;

    client.delete(deadline(), &[&vlan]).await.unwrap();

    let requests = device.set_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].delete.len(), 1);
    assert_eq!(device.config(&vlan.path()), None);
}

#[tokio::test]
async fn delete_list_item_with_default() {
    let device = MockDevice::nxos();
    let path = "System/intf-items/phys-items/PhysIf-list[id=eth2]";
    device.insert_config(
        path,
        json!({"id": "eth2", "adminSt": "up", "descr": "uplink", "mtu": 9216}),
    );
    let client = connect(&device).await;

    let port = PhysIf {
        id: "eth2".to_owned(),
        admin_st: "up".to_owned(),
        descr: "uplink".to_owned(),
    };
    client.delete(deadline(), &[&port]).await.unwrap();

    // List rows with a default are replaced with it, dropping any other
    // leaf set on the row.
    let requests = device.set_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].update.is_empty());
    assert!(requests[0].delete.is_empty());
    assert_eq!(requests[0].replace.len(), 1);
    assert_eq!(update_path(&requests[0].replace[0]), path);
    assert_eq!(
        update_value(&requests[0].replace[0]),
        json!({"id": "eth2", "adminSt": "down", "descr": ""})
    );
    assert_eq!(
        device.config(path),
        Some(json!({"id": "eth2", "adminSt": "down", "descr": ""}))
    );
}

#[tokio::test]
async fn delete_mixed_batch() {
    let device = MockDevice::nxos();
    let client = connect(&device).await;

    let hostname = Hostname::default();
    let banner = Banner::default();
    let port = PhysIf {
        id: "eth3".to_owned(),
        ..Default::default()
    };
    client
        .delete(deadline(), &[&hostname, &banner, &port])
        .await
        .unwrap();

    let requests = device.set_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].delete.len(), 1);
    assert_eq!(requests[0].replace.len(), 2);
    assert!(requests[0].update.is_empty());
}

#[tokio::test]
async fn delete_empty_batch() {
    let device = MockDevice::nxos();
    let client = connect(&device).await;

    client.delete(deadline(), &[]).await.unwrap();
    assert!(device.set_requests().is_empty());
}
