use proptest::prelude::*;

use fleetassign::{
    assignment::DeviceAssignment,
    plan::{plan_batches, BatchKey},
    types::{AttributeKind, MAX_BATCH_SIZE},
};

mod common;
use common::existing_row;

fn subscription_row(i: usize, subscription_id: &str) -> DeviceAssignment {
    let mut row = existing_row(&format!("SN-{i:04}"), &format!("dev-{i}"));
    row.selected_subscription_id = Some(subscription_id.to_string());
    row
}

fn tag_row(i: usize, key: &str, value: &str) -> DeviceAssignment {
    let mut row = existing_row(&format!("SN-{i:04}"), &format!("dev-{i}"));
    row.selected_tags.insert(key.to_string(), value.to_string());
    row
}

#[test]
fn subscription_call_count_is_ceiling_of_group_size() {
    let rows: Vec<_> = (0..60).map(|i| subscription_row(i, "sub-basic")).collect();
    let batches = plan_batches(AttributeKind::Subscription, rows.iter());

    assert_eq!(batches.len(), 60usize.div_ceil(MAX_BATCH_SIZE));
    assert_eq!(batches[0].devices.len(), 25);
    assert_eq!(batches[1].devices.len(), 25);
    assert_eq!(batches[2].devices.len(), 10);
}

#[test]
fn distinct_tag_sets_are_never_merged() {
    let mut rows: Vec<_> = (0..20).map(|i| tag_row(i, "env", "prod")).collect();
    rows.extend((20..60).map(|i| tag_row(i, "env", "dev")));

    let batches = plan_batches(AttributeKind::Tags, rows.iter());

    // One call for the prod group, two for the dev group; never one
    // 60-device call.
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| b.devices.len() <= MAX_BATCH_SIZE));
    let prod: usize = batches
        .iter()
        .filter(|b| matches!(&b.key, BatchKey::Tags { tags } if tags[0].1 == "prod"))
        .map(|b| b.devices.len())
        .sum();
    let dev: usize = batches
        .iter()
        .filter(|b| matches!(&b.key, BatchKey::Tags { tags } if tags[0].1 == "dev"))
        .map(|b| b.devices.len())
        .sum();
    assert_eq!(prod, 20);
    assert_eq!(dev, 40);
}

#[test]
fn application_key_pairs_application_with_region() {
    let mut a = existing_row("SN-A", "dev-a");
    a.selected_application_id = Some("app-1".to_string());
    a.selected_region = Some("eu".to_string());
    let mut b = existing_row("SN-B", "dev-b");
    b.selected_application_id = Some("app-1".to_string());
    b.selected_region = Some("us".to_string());

    let batches = plan_batches(AttributeKind::Application, [&a, &b]);
    assert_eq!(batches.len(), 2);
}

#[test]
fn observed_region_backs_a_missing_selection() {
    let mut row = existing_row("SN-A", "dev-a");
    row.selected_application_id = Some("app-1".to_string());
    row.region = Some("eu".to_string());

    let batches = plan_batches(AttributeKind::Application, [&row]);
    assert_eq!(
        batches[0].key,
        BatchKey::Application {
            application_id: "app-1".to_string(),
            region: "eu".to_string(),
        }
    );
}

#[test]
fn rows_without_a_device_id_are_excluded() {
    let mut unregistered = DeviceAssignment::new("SN-NEW");
    unregistered.selected_subscription_id = Some("sub-basic".to_string());
    let registered = subscription_row(1, "sub-basic");

    let batches = plan_batches(AttributeKind::Subscription, [&unregistered, &registered]);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].devices.len(), 1);
    assert_eq!(batches[0].devices[0].serial_number, "SN-0001");
}

#[test]
fn groups_keep_first_encountered_order() {
    let rows = vec![
        subscription_row(0, "sub-b"),
        subscription_row(1, "sub-a"),
        subscription_row(2, "sub-b"),
    ];
    let batches = plan_batches(AttributeKind::Subscription, rows.iter());

    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[0].key,
        BatchKey::Subscription {
            subscription_id: "sub-b".to_string()
        }
    );
    assert_eq!(batches[0].devices.len(), 2);
}

proptest! {
    #[test]
    fn planned_batches_respect_ceiling_and_preserve_devices(
        groups in prop::collection::vec((0u8..6, 1usize..80), 1..6)
    ) {
        let mut rows = Vec::new();
        let mut serial = 0usize;
        for (group, count) in &groups {
            for _ in 0..*count {
                rows.push(subscription_row(serial, &format!("sub-{group}")));
                serial += 1;
            }
        }

        let batches = plan_batches(AttributeKind::Subscription, rows.iter());

        for batch in &batches {
            prop_assert!(!batch.devices.is_empty());
            prop_assert!(batch.devices.len() <= MAX_BATCH_SIZE);
        }

        let planned: usize = batches.iter().map(|b| b.devices.len()).sum();
        prop_assert_eq!(planned, rows.len());

        // Batches sharing a key are contiguous: groups are never interleaved.
        let mut seen = Vec::new();
        for batch in &batches {
            if seen.last() != Some(&batch.key) {
                prop_assert!(!seen.contains(&batch.key));
                seen.push(batch.key.clone());
            }
        }
    }
}
