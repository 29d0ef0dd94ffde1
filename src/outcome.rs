//! Immutable result snapshots returned to the caller.

use serde::{Deserialize, Serialize};

use crate::types::{BulkAction, DeviceId, OperationType, Phase, SerialNumber};

/// Outcome of one external call covering one batch of devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Whether the call was accepted by the provider.
    pub success: bool,
    /// Kind of call.
    pub operation_type: OperationType,
    /// Provider identifiers of the devices covered by the call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_ids: Vec<DeviceId>,
    /// Serial numbers of the devices covered by the call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_serials: Vec<SerialNumber>,
    /// Provider error message for a failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Handle for the provider's asynchronous processing of this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_url: Option<String>,
}

impl OperationResult {
    /// Successful outcome with no async handle.
    pub fn ok(operation_type: OperationType) -> Self {
        Self {
            success: true,
            operation_type,
            device_ids: Vec::new(),
            device_serials: Vec::new(),
            error: None,
            operation_url: None,
        }
    }

    /// Failed outcome carrying the provider or transport error.
    pub fn failed(operation_type: OperationType, error: impl Into<String>) -> Self {
        Self {
            success: false,
            operation_type,
            device_ids: Vec::new(),
            device_serials: Vec::new(),
            error: Some(error.into()),
            operation_url: None,
        }
    }

    /// Attaches the covered device identifiers and serials.
    pub fn with_devices(
        mut self,
        device_ids: Vec<DeviceId>,
        device_serials: Vec<SerialNumber>,
    ) -> Self {
        self.device_ids = device_ids;
        self.device_serials = device_serials;
        self
    }
}

/// Aggregate outcome of one workflow phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    /// Which phase this describes.
    pub phase: Phase,
    /// True iff no operation in the phase failed.
    pub success: bool,
    /// Per-batch outcomes in firing order.
    pub operations: Vec<OperationResult>,
    /// Devices the phase attempted to touch.
    pub devices_processed: usize,
    /// Number of failed operations.
    pub errors: usize,
    /// Wall time the phase took, in milliseconds.
    pub duration_ms: u64,
}

impl PhaseResult {
    /// Builds a phase result, deriving `success` and `errors` from the
    /// collected operations.
    pub fn from_operations(
        phase: Phase,
        operations: Vec<OperationResult>,
        devices_processed: usize,
        duration_ms: u64,
    ) -> Self {
        let errors = operations.iter().filter(|op| !op.success).count();
        Self {
            phase,
            success: errors == 0,
            operations,
            devices_processed,
            errors,
            duration_ms,
        }
    }
}

/// Top-level outcome of one `execute` run of the assignment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    /// True iff zero failed operations across all phases.
    pub success: bool,
    /// Every per-batch outcome, flattened in firing order.
    pub operations: Vec<OperationResult>,
    /// Per-phase outcomes in phase order; skipped phases are absent.
    pub phase_results: Vec<PhaseResult>,
    /// Devices successfully registered in phase 2.
    pub devices_created: usize,
    /// Devices covered by successful application batches.
    pub applications_assigned: usize,
    /// Devices covered by successful subscription batches.
    pub subscriptions_assigned: usize,
    /// Devices covered by successful tag batches.
    pub tags_updated: usize,
    /// Serials of devices created in this run.
    pub new_devices_added: Vec<SerialNumber>,
    /// Serials of devices whose creation failed.
    pub new_devices_failed: Vec<SerialNumber>,
    /// Wall time of the whole run, in milliseconds.
    pub duration_ms: u64,
}

impl ApplyResult {
    /// Number of failed operations across all phases.
    pub fn error_count(&self) -> usize {
        self.operations.iter().filter(|op| !op.success).count()
    }
}

/// Outcome of one device-action run (archive, unarchive, remove).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// True iff zero failed batches. A failed post-run resync does not
    /// affect this flag.
    pub success: bool,
    /// The action that was executed.
    pub action: BulkAction,
    /// Per-batch outcomes in firing order.
    pub operations: Vec<OperationResult>,
    /// Devices that made it into batches.
    pub devices_processed: usize,
    /// Devices dropped for lacking a resolvable identifier.
    pub devices_skipped: usize,
    /// Serials of the skipped devices.
    pub skipped_serials: Vec<SerialNumber>,
    /// Number of failed batches.
    pub errors: usize,
    /// Wall time of the run, in milliseconds.
    pub duration_ms: u64,
}
