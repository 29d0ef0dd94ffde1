//! Shared identifiers, enums, and external-API constants.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Provider-assigned device identifier.
pub type DeviceId = String;
/// Manufacturer serial number, the logical key for every assignment row.
pub type SerialNumber = String;
/// Key/value tag set applied to a device.
pub type TagMap = hashbrown::HashMap<String, String>;

/// Hard ceiling on device identifiers per external call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Minimum spacing between PATCH-class calls (~17/min under a 20/min quota).
pub const PATCH_INTERVAL: Duration = Duration::from_millis(3_500);

/// Minimum spacing between POST-class calls (~23/min under a 25/min quota).
pub const POST_INTERVAL: Duration = Duration::from_millis(2_600);

/// Kind of external call an [`crate::outcome::OperationResult`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Device registration POST.
    Create,
    /// Application (network application + region) assignment PATCH.
    Application,
    /// Subscription assignment PATCH.
    Subscription,
    /// Tag update PATCH.
    Tags,
    /// Archive lifecycle action.
    Archive,
    /// Unarchive lifecycle action.
    Unarchive,
    /// Remove lifecycle action.
    Remove,
}

/// Attribute family handled by the fire-then-poll executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Network application plus region.
    Application,
    /// Subscription.
    Subscription,
    /// Tag set.
    Tags,
}

/// Bulk action requested against a set of devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    /// Attribute assignment; handled by the phased workflow, rejected by the
    /// action executor.
    Assign,
    /// Archive devices.
    Archive,
    /// Unarchive devices.
    Unarchive,
    /// Permanently remove devices.
    Remove,
}

/// One of the strictly ordered stages of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Patch devices already present in inventory.
    ExistingDevices,
    /// Register devices missing from inventory.
    CreateDevices,
    /// Pull refreshed inventory after creation.
    Refresh,
    /// Patch the devices created earlier in the same run.
    NewDevices,
}
