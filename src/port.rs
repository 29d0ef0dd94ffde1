//! Abstract ports onto the external device-management provider.

use async_trait::async_trait;
use tokio::time::Duration;

use crate::{
    assignment::DeviceAssignment,
    outcome::OperationResult,
    types::{DeviceId, SerialNumber, TagMap},
};

/// Failure surfaced by a port call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Transport-level failure (network, HTTP).
    Transport(String),
    /// Provider rejected the request.
    Provider(String),
    /// Completion polling did not reach a terminal state in time.
    CompletionTimeout(String),
}

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Provider(msg) => write!(f, "provider error: {msg}"),
            Self::CompletionTimeout(msg) => write!(f, "completion timeout: {msg}"),
        }
    }
}

/// Result alias for port calls.
pub type PortResult<T> = Result<T, PortError>;

/// Write surface of the external device-management API.
///
/// Every batched operation takes at most
/// [`MAX_BATCH_SIZE`](crate::types::MAX_BATCH_SIZE) device identifiers and
/// may return an [`OperationResult`] carrying an async operation handle.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Registers one device (POST-class).
    async fn add_device(&self, device: &DeviceAssignment) -> PortResult<OperationResult>;

    /// Assigns a subscription to a batch of devices (PATCH-class).
    async fn assign_subscription(
        &self,
        subscription_id: &str,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult>;

    /// Assigns a network application and region to a batch of devices
    /// (PATCH-class).
    async fn assign_application(
        &self,
        application_id: &str,
        region: &str,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult>;

    /// Replaces the tag set on a batch of devices (PATCH-class).
    async fn update_tags(
        &self,
        tags: &TagMap,
        device_ids: &[DeviceId],
    ) -> PortResult<OperationResult>;

    /// Archives a batch of devices.
    async fn archive_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult>;

    /// Unarchives a batch of devices.
    async fn unarchive_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult>;

    /// Permanently removes a batch of devices.
    async fn remove_devices(&self, device_ids: &[DeviceId]) -> PortResult<OperationResult>;

    /// Polls an async operation handle to a terminal [`OperationResult`].
    async fn wait_for_completion(
        &self,
        operation_url: &str,
        timeout: Duration,
    ) -> PortResult<OperationResult>;
}

/// Read surface used to re-resolve serials after inventory refresh.
#[async_trait]
pub trait DeviceLookup: Send + Sync {
    /// Returns the inventory records matching `serials`. Serials still
    /// unknown to the inventory are simply absent from the result.
    async fn find_by_serials(&self, serials: &[SerialNumber])
        -> PortResult<Vec<DeviceAssignment>>;
}

/// Inventory synchronization capability.
#[async_trait]
pub trait InventorySync: Send + Sync {
    /// Pulls device inventory from the provider into the local store.
    async fn sync_devices(&self) -> PortResult<()>;

    /// Pulls subscription inventory from the provider into the local store.
    async fn sync_subscriptions(&self) -> PortResult<()>;
}
