//! Fire-then-poll executor for application, subscription, and tag batches.

use tokio::time::Duration;
use tracing::{debug, warn};

use crate::{
    gate::RateGate,
    outcome::OperationResult,
    plan::{BatchKey, PlannedBatch},
    port::DeviceManager,
    types::OperationType,
};

/// What to do with async operation handles collected during the fire pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Report pending handles as success without polling. The provider's
    /// asynchronous processing is trusted; a later inventory resync is
    /// expected to verify the outcome.
    FireOnly,
    /// Poll every pending handle to a terminal state.
    AwaitCompletion,
}

/// Drives one attribute-change type through the gate and the device-manager
/// port, producing one [`OperationResult`] per planned batch.
///
/// A failed batch never halts the remaining batches; every planned batch is
/// always attempted.
pub struct AttributeExecutor<'a> {
    manager: &'a dyn DeviceManager,
    gate: RateGate,
    policy: CompletionPolicy,
    completion_timeout: Duration,
}

impl<'a> AttributeExecutor<'a> {
    /// Executor over `manager`, paced by `gate`.
    pub fn new(
        manager: &'a dyn DeviceManager,
        gate: RateGate,
        policy: CompletionPolicy,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            gate,
            policy,
            completion_timeout,
        }
    }

    /// Fires every batch in order, then resolves pending async handles
    /// according to the configured [`CompletionPolicy`]. Results come back
    /// in firing order regardless of when each handle resolved.
    pub async fn run(&self, batches: &[PlannedBatch]) -> Vec<OperationResult> {
        let mut slots: Vec<Option<OperationResult>> = Vec::with_capacity(batches.len());
        let mut pending: Vec<(usize, OperationResult)> = Vec::new();

        for (index, batch) in batches.iter().enumerate() {
            self.gate.wait_before_call(index).await;
            let operation_type = operation_type_of(&batch.key);
            debug!(
                "firing {operation_type:?} batch {index} covering {} devices",
                batch.devices.len()
            );

            match self.fire(batch).await {
                Ok(result) => {
                    let result = result
                        .with_devices(batch.device_ids(), batch.device_serials());
                    if result.success && result.operation_url.is_some() {
                        pending.push((index, result));
                        slots.push(None);
                    } else {
                        if !result.success {
                            warn!(
                                "{operation_type:?} batch {index} rejected: {:?}",
                                result.error
                            );
                        }
                        slots.push(Some(result));
                    }
                }
                Err(err) => {
                    warn!("{operation_type:?} batch {index} failed: {err}");
                    slots.push(Some(
                        OperationResult::failed(operation_type, err.to_string())
                            .with_devices(batch.device_ids(), batch.device_serials()),
                    ));
                }
            }
        }

        for (index, fired) in pending {
            let resolved = match self.policy {
                CompletionPolicy::FireOnly => fired,
                CompletionPolicy::AwaitCompletion => self.poll(fired).await,
            };
            slots[index] = Some(resolved);
        }

        slots.into_iter().flatten().collect()
    }

    async fn fire(&self, batch: &PlannedBatch) -> crate::port::PortResult<OperationResult> {
        let device_ids = batch.device_ids();
        match &batch.key {
            BatchKey::Application {
                application_id,
                region,
            } => {
                self.manager
                    .assign_application(application_id, region, &device_ids)
                    .await
            }
            BatchKey::Subscription { subscription_id } => {
                self.manager
                    .assign_subscription(subscription_id, &device_ids)
                    .await
            }
            BatchKey::Tags { .. } => {
                let tags = batch.key.tag_map().unwrap_or_default();
                self.manager.update_tags(&tags, &device_ids).await
            }
        }
    }

    async fn poll(&self, fired: OperationResult) -> OperationResult {
        let Some(url) = fired.operation_url.clone() else {
            return fired;
        };
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

/// Operation type recorded for batches keyed by `key`.
pub fn operation_type_of(key: &BatchKey) -> OperationType {
    match key {
        BatchKey::Application { .. } => OperationType::Application,
        BatchKey::Subscription { .. } => OperationType::Subscription,
        BatchKey::Tags { .. } => OperationType::Tags,
    }
}
