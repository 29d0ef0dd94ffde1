#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Duration;

use fleetassign::{
    assignment::DeviceAssignment,
    outcome::OperationResult,
    port::{DeviceLookup, DeviceManager, InventorySync, PortError, PortResult},
    types::{DeviceId, OperationType, SerialNumber, TagMap},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddDevice {
        serial: String,
    },
    AssignApplication {
        application_id: String,
        region: String,
        device_ids: Vec<String>,
    },
    AssignSubscription {
        subscription_id: String,
        device_ids: Vec<String>,
    },
    UpdateTags {
        device_ids: Vec<String>,
    },
    ArchiveDevices {
        device_ids: Vec<String>,
    },
    UnarchiveDevices {
        device_ids: Vec<String>,
    },
    RemoveDevices {
        device_ids: Vec<String>,
    },
    WaitForCompletion {
        operation_url: String,
    },
}

/// Scripted device-manager port that records every call.
#[derive(Default)]
pub struct MockManager {
    pub calls: Arc<Mutex<Vec<Call>>>,
    /// Zero-based indices among subscription calls that return a provider
    /// failure.
    pub fail_subscription_batches: Vec<usize>,
    /// Return an async operation handle from creation calls.
    pub create_handles: bool,
    /// Return an async operation handle from attribute patch calls.
    pub patch_handles: bool,
    /// Return an async operation handle from lifecycle-action calls.
    pub action_handles: bool,
    /// Make completion polling fail.
    pub completion_fails: bool,
}

impl MockManager {
    pub fn spy(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().expect("lock");
        calls.push(call);
        calls.len()
    }

    fn subscription_calls_so_far(&self) -> usize {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|c| matches!(c, Call::AssignSubscription { .. }))
            .count()
    }

    fn result(&self, operation_type: OperationType, with_handle: bool, n: usize) -> OperationResult {
        let mut result = OperationResult::ok(operation_type);
        if with_handle {
            result.operation_url = Some(format!("op://{n}"));
        }
        result
    }
}

#[async_trait]
impl DeviceManager for MockManager {
    async fn add_device(&self, device: &DeviceAssignment) -> PortResult<OperationResult> {
        let n = self.record(Call::AddDevice {
            serial: device.serial_number.clone(),
        });
        Ok(self.result(OperationType::Create, self.create_handles, n))
    }

    async fn assign_subscription(
        &self,
        subscription_id: &str,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult> {
        let index = self.subscription_calls_so_far();
        let n = self.record(Call::AssignSubscription {
            subscription_id: subscription_id.to_string(),
            device_ids: device_ids.to_vec(),
        });
        if self.fail_subscription_batches.contains(&index) {
            return Err(PortError::Provider(format!(
                "subscription batch {index} rejected"
            )));
        }
        Ok(self.result(OperationType::Subscription, self.patch_handles, n))
    }

    async fn assign_application(
        &self,
        application_id: &str,
        region: &str,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult> {
        let n = self.record(Call::AssignApplication {
            application_id: application_id.to_string(),
            region: region.to_string(),
            device_ids: device_ids.to_vec(),
        });
        Ok(self.result(OperationType::Application, self.patch_handles, n))
    }

    async fn update_tags(
        &self,
        _tags: &TagMap,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult> {
        let n = self.record(Call::UpdateTags {
            device_ids: device_ids.to_vec(),
        });
        Ok(self.result(OperationType::Tags, self.patch_handles, n))
    }

    async fn archive_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult> {
        let n = self.record(Call::ArchiveDevices {
            device_ids: device_ids.to_vec(),
        });
        Ok(self.result(OperationType::Archive, self.action_handles, n))
    }

    async fn unarchive_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult> {
        let n = self.record(Call::UnarchiveDevices {
            device_ids: device_ids.to_vec(),
        });
        Ok(self.result(OperationType::Unarchive, self.action_handles, n))
    }

    async fn remove_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult> {
        let n = self.record(Call::RemoveDevices {
            device_ids: device_ids.to_vec(),
        });
        Ok(self.result(OperationType::Remove, self.action_handles, n))
    }

    async fn wait_for_completion(
        &self,
        operation_url: &str,
        _timeout: Duration,
    ) -> PortResult<OperationResult> {
        self.record(Call::WaitForCompletion {
            operation_url: operation_url.to_string(),
        });
        if self.completion_fails {
            return Err(PortError::CompletionTimeout(operation_url.to_string()));
        }
        Ok(OperationResult::ok(OperationType::Create))
    }
}

/// Lookup port returning a fixed set of inventory records.
#[derive(Default)]
pub struct MockLookup {
    pub records: Vec<DeviceAssignment>,
    requested: Arc<Mutex<Vec<Vec<SerialNumber>>>>,
}

impl MockLookup {
    pub fn with_records(records: Vec<DeviceAssignment>) -> Self {
        Self {
            records,
            requested: Arc::default(),
        }
    }

    pub fn requested(&self) -> Arc<Mutex<Vec<Vec<SerialNumber>>>> {
        Arc::clone(&self.requested)
    }
}

#[async_trait]
impl DeviceLookup for MockLookup {
    async fn find_by_serials(
        &self,
        serials: &[SerialNumber],
    ) -> PortResult<Vec<DeviceAssignment>> {
        self.requested.lock().expect("lock").push(serials.to_vec());
        Ok(self
            .records
            .iter()
            .filter(|r| serials.contains(&r.serial_number))
            .cloned()
            .collect())
    }
}

/// Sync port counting invocations, optionally failing.
#[derive(Default)]
pub struct MockSync {
    pub device_syncs: Arc<Mutex<usize>>,
    pub subscription_syncs: Arc<Mutex<usize>>,
    pub fail: bool,
}

impl MockSync {
    pub fn device_sync_count(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.device_syncs)
    }

    pub fn subscription_sync_count(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.subscription_syncs)
    }
}

#[async_trait]
impl InventorySync for MockSync {
    async fn sync_devices(&self) -> PortResult<()> {
        *self.device_syncs.lock().expect("lock") += 1;
        if self.fail {
            return Err(PortError::Transport("sync refused".to_string()));
        }
        Ok(())
    }

    async fn sync_subscriptions(&self) -> PortResult<()> {
        *self.subscription_syncs.lock().expect("lock") += 1;
        if self.fail {
            return Err(PortError::Transport("sync refused".to_string()));
        }
        Ok(())
    }
}

/// Row for a device already present in inventory.
pub fn existing_row(serial: &str, device_id: &str) -> DeviceAssignment {
    let mut row = DeviceAssignment::new(serial);
    row.device_id = Some(device_id.to_string());
    row
}

/// Row for a device not yet registered.
pub fn new_row(serial: &str) -> DeviceAssignment {
    DeviceAssignment::new(serial)
}
