//! Batched executor for device lifecycle actions.

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{
    assignment::DeviceAssignment,
    gate::RateGate,
    outcome::{ActionResult, OperationResult},
    port::{DeviceManager, InventorySync},
    types::{BulkAction, DeviceId, OperationType, SerialNumber, MAX_BATCH_SIZE},
};

/// Rejected before any work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// The requested action is not a lifecycle action; attribute assignment
    /// goes through the phased workflow instead.
    UnsupportedAction(BulkAction),
}

// Lifecycle dispatch target, produced only after the action is validated.
#[derive(Clone, Copy)]
enum LifecycleCall {
    Archive,
    Unarchive,
    Remove,
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedAction(action) => {
                write!(f, "unsupported device action: {action:?}")
            }
        }
    }
}

/// Executes one lifecycle action (archive, unarchive, remove) over a device
/// list, chunked at [`MAX_BATCH_SIZE`] and run sequentially.
///
/// Lifecycle batches are not gated by default; inject a gate to put them
/// under the same quota pacing as the patch sequences.
pub struct ActionExecutor<'a> {
    manager: &'a dyn DeviceManager,
    gate: Option<RateGate>,
    completion_timeout: Duration,
}

impl<'a> ActionExecutor<'a> {
    /// Ungated executor over `manager`.
    pub fn new(manager: &'a dyn DeviceManager, completion_timeout: Duration) -> Self {
        Self {
            manager,
            gate: None,
            completion_timeout,
        }
    }

    /// Paces batches with `gate`.
    pub fn with_gate(mut self, gate: RateGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Runs `action` over `devices`.
    ///
    /// Devices without a resolvable identifier are filtered out before
    /// batching and counted as skipped. When `wait_for_completion` is set,
    /// each batch's async handle is polled to a terminal state. When
    /// `sync_after` is set and a sync port is supplied, one inventory resync
    /// is triggered after all batches; a resync failure is logged and never
    /// flips the action result.
    pub async fn run(
        &self,
        action: BulkAction,
        devices: &[DeviceAssignment],
        wait_for_completion: bool,
        sync_after: bool,
        sync: Option<&dyn InventorySync>,
    ) -> Result<ActionResult, ActionError> {
        let (call, operation_type) = match action {
            BulkAction::Assign => return Err(ActionError::UnsupportedAction(action)),
            BulkAction::Archive => (LifecycleCall::Archive, OperationType::Archive),
            BulkAction::Unarchive => (LifecycleCall::Unarchive, OperationType::Unarchive),
            BulkAction::Remove => (LifecycleCall::Remove, OperationType::Remove),
        };

        let started = Instant::now();
        let mut resolvable: Vec<(DeviceId, SerialNumber)> = Vec::new();
        let mut skipped_serials: Vec<SerialNumber> = Vec::new();
        for device in devices {
            match &device.device_id {
                Some(id) => resolvable.push((id.clone(), device.serial_number.clone())),
                None => skipped_serials.push(device.serial_number.clone()),
            }
        }
        if !skipped_serials.is_empty() {
            warn!(
                "{action:?}: {} devices lack a provider identifier and were skipped",
                skipped_serials.len()
            );
        }

        let chunks: Vec<&[(DeviceId, SerialNumber)]> =
            resolvable.chunks(MAX_BATCH_SIZE).collect();
        info!(
            "{action:?}: {} devices in {} batches",
            resolvable.len(),
            chunks.len()
        );

        let mut operations = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            if let Some(gate) = &self.gate {
                gate.wait_before_call(index).await;
            }
            let device_ids: Vec<DeviceId> = chunk.iter().map(|(id, _)| id.clone()).collect();
            let serials: Vec<SerialNumber> = chunk.iter().map(|(_, sn)| sn.clone()).collect();

            let fired = match call {
                LifecycleCall::Archive => self.manager.archive_devices(&device_ids).await,
                LifecycleCall::Unarchive => self.manager.unarchive_devices(&device_ids).await,
                LifecycleCall::Remove => self.manager.remove_devices(&device_ids).await,
            };

            let result = match fired {
                Ok(result) => {
                    let result = result.with_devices(device_ids, serials);
                    if wait_for_completion {
                        self.resolve(result).await
                    } else {
                        result
                    }
                }
                Err(err) => {
                    warn!("{action:?} batch {index} failed: {err}");
                    OperationResult::failed(operation_type, err.to_string())
                        .with_devices(device_ids, serials)
                }
            };
            operations.push(result);
        }

        if sync_after {
            match sync {
                Some(sync) => {
                    if let Err(err) = sync.sync_devices().await {
                        warn!("post-action inventory resync failed: {err}");
                    }
                }
                None => debug!("no sync port configured, skipping post-action resync"),
            }
        }

        let errors = operations.iter().filter(|op| !op.success).count();
        Ok(ActionResult {
            success: errors == 0,
            action,
            operations,
            devices_processed: resolvable.len(),
            devices_skipped: skipped_serials.len(),
            skipped_serials,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn resolve(&self, fired: OperationResult) -> OperationResult {
        let Some(url) = fired.operation_url.clone() else {
            return fired;
        };
        if !fired.success {
            return fired;
        }
        match self
            .manager
            .wait_for_completion(&url, self.completion_timeout)
            .await
        {
            Ok(terminal) => {
                let mut terminal = terminal
                    .with_devices(fired.device_ids.clone(), fired.device_serials.clone());
                terminal.operation_type = fired.operation_type;
                terminal
            }
            Err(err) => {
                warn!("completion poll for {url} failed: {err}");
                OperationResult::failed(fired.operation_type, err.to_string())
                    .with_devices(fired.device_ids, fired.device_serials)
            }
        }
    }
}
