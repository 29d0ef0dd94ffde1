//! Four-phase orchestrator for bulk attribute assignment.

use std::sync::Arc;

use hashbrown::HashMap;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    assignment::DeviceAssignment,
    exec::{
        action::{ActionError, ActionExecutor},
        attribute::{AttributeExecutor, CompletionPolicy},
    },
    gate::RateGate,
    outcome::{ActionResult, ApplyResult, OperationResult, PhaseResult},
    plan::plan_batches,
    port::{DeviceLookup, DeviceManager, InventorySync},
    types::{AttributeKind, BulkAction, OperationType, Phase, SerialNumber, PATCH_INTERVAL, POST_INTERVAL},
};

/// Tunable pacing and polling knobs for one workflow instance.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Spacing between PATCH-class calls within one attribute sequence.
    pub patch_interval: Duration,
    /// Spacing between POST-class calls in the creation phase.
    pub post_interval: Duration,
    /// Spacing injected before lifecycle-action batches. Absent by default.
    pub action_interval: Option<Duration>,
    /// Timeout handed to completion polling.
    pub completion_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            patch_interval: PATCH_INTERVAL,
            post_interval: POST_INTERVAL,
            action_interval: None,
            completion_timeout: Duration::from_secs(120),
        }
    }
}

/// Sequences the four workflow phases over the external ports.
///
/// Phases are strictly sequential; batches within a phase never run
/// concurrently with each other. A failed batch is recorded and never
/// re-attempted; the orchestrator always completes and reports
/// [`ApplyResult::success`] as a pure aggregate of per-operation outcomes.
pub struct AssignmentWorkflow {
    manager: Arc<dyn DeviceManager>,
    lookup: Option<Arc<dyn DeviceLookup>>,
    sync: Option<Arc<dyn InventorySync>>,
    config: WorkflowConfig,
}

impl AssignmentWorkflow {
    /// Workflow over `manager` with no optional collaborators.
    pub fn new(manager: Arc<dyn DeviceManager>) -> Self {
        Self {
            manager,
            lookup: None,
            sync: None,
            config: WorkflowConfig::default(),
        }
    }

    /// Supplies the lookup port used to re-resolve newly created devices.
    pub fn with_lookup(mut self, lookup: Arc<dyn DeviceLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Supplies the inventory-sync port used after device creation.
    pub fn with_sync(mut self, sync: Arc<dyn InventorySync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Overrides the default pacing and polling configuration.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the full multi-phase workflow over `assignments`.
    ///
    /// `wait_for_completion` controls whether phase-2 device creations poll
    /// their async handles to a terminal state before the next creation;
    /// attribute patches never poll regardless.
    pub async fn execute(
        &self,
        assignments: Vec<DeviceAssignment>,
        wait_for_completion: bool,
    ) -> ApplyResult {
        let started = Instant::now();

        let (existing, new): (Vec<_>, Vec<_>) = assignments
            .iter()
            .cloned()
            .partition(|a| !a.needs_creation());
        for assignment in &assignments {
            if assignment.subscription_without_application() {
                warn!(
                    "device {} selected a subscription without any application; \
                     the provider requires application before subscription and \
                     the call is likely to fail",
                    assignment.serial_number
                );
            }
        }
        info!(
            "bulk assignment run: {} existing, {} new devices",
            existing.len(),
            new.len()
        );

        let mut phase_results: Vec<PhaseResult> = Vec::new();
        let mut new_devices_added: Vec<SerialNumber> = Vec::new();
        let mut new_devices_failed: Vec<SerialNumber> = Vec::new();

        if !existing.is_empty() {
            let result = self.run_attribute_phase(Phase::ExistingDevices, &existing).await;
            phase_results.push(result);
        }

        if !new.is_empty() {
            let result = self
                .run_creation_phase(
                    &new,
                    wait_for_completion,
                    &mut new_devices_added,
                    &mut new_devices_failed,
                )
                .await;
            phase_results.push(result);
        }

        if !new_devices_added.is_empty() {
            if let Some(result) = self.run_refresh_phase().await {
                phase_results.push(result);
            }
            if let Some(result) = self
                .run_new_device_phase(&new, &new_devices_added)
                .await
            {
                phase_results.push(result);
            }
        }

        self.aggregate(
            phase_results,
            new_devices_added,
            new_devices_failed,
            started.elapsed(),
        )
    }

    /// Runs one lifecycle action over `devices`, the sibling surface to
    /// [`Self::execute`]. Rejects [`BulkAction::Assign`] before any work.
    pub async fn execute_action(
        &self,
        action: BulkAction,
        devices: &[DeviceAssignment],
        wait_for_completion: bool,
        sync_after: bool,
    ) -> Result<ActionResult, ActionError> {
        let mut executor = ActionExecutor::new(&*self.manager, self.config.completion_timeout);
        if let Some(interval) = self.config.action_interval {
            executor = executor.with_gate(RateGate::new(interval));
        }
        executor
            .run(
                action,
                devices,
                wait_for_completion,
                sync_after,
                self.sync.as_deref(),
            )
            .await
    }

    /// Applies the fixed application -> subscription -> tags loop to
    /// `assignments`, filtering each pass by its `needs_*` predicate.
    async fn run_attribute_phase(
        &self,
        phase: Phase,
        assignments: &[DeviceAssignment],
    ) -> PhaseResult {
        let started = Instant::now();
        let mut operations: Vec<OperationResult> = Vec::new();

        // Application before subscription is a hard provider constraint.
        for kind in [
            AttributeKind::Application,
            AttributeKind::Subscription,
            AttributeKind::Tags,
        ] {
            let selected = assignments.iter().filter(|a| match kind {
                AttributeKind::Application => a.needs_application_patch(),
                AttributeKind::Subscription => a.needs_subscription_patch(),
                AttributeKind::Tags => a.needs_tag_patch(),
            });
            let batches = plan_batches(kind, selected);
            if batches.is_empty() {
                debug!("{phase:?}: no {kind:?} batches to fire");
                continue;
            }

            let gate = RateGate::new(self.config.patch_interval);
            info!(
                "{phase:?}: firing {} {kind:?} batches, estimated gate delay {:?}",
                batches.len(),
                gate.estimate(batches.len())
            );
            let executor = AttributeExecutor::new(
                &*self.manager,
                gate,
                CompletionPolicy::FireOnly,
                self.config.completion_timeout,
            );
            operations.extend(executor.run(&batches).await);
        }

        PhaseResult::from_operations(
            phase,
            operations,
            assignments.len(),
            started.elapsed().as_millis() as u64,
        )
    }

    /// Registers each new device sequentially behind the POST-class gate.
    async fn run_creation_phase(
        &self,
        new: &[DeviceAssignment],
        wait_for_completion: bool,
        added: &mut Vec<SerialNumber>,
        failed: &mut Vec<SerialNumber>,
    ) -> PhaseResult {
        let started = Instant::now();
        let gate = RateGate::new(self.config.post_interval);
        info!(
            "creating {} devices, estimated gate delay {:?}",
            new.len(),
            gate.estimate(new.len())
        );

        let mut operations = Vec::with_capacity(new.len());
        for (index, device) in new.iter().enumerate() {
            gate.wait_before_call(index).await;
            let result = match self.manager.add_device(device).await {
                Ok(result) => {
                    let result = result.with_devices(
                        Vec::new(),
                        vec![device.serial_number.clone()],
                    );
                    if wait_for_completion && result.success {
                        self.poll_creation(result).await
                    } else {
                        result
                    }
                }
                Err(err) => {
                    warn!("creating device {} failed: {err}", device.serial_number);
                    OperationResult::failed(OperationType::Create, err.to_string())
                        .with_devices(Vec::new(), vec![device.serial_number.clone()])
                }
            };

            if result.success {
                added.push(device.serial_number.clone());
            } else {
                failed.push(device.serial_number.clone());
            }
            operations.push(result);
        }

        PhaseResult::from_operations(
            Phase::CreateDevices,
            operations,
            new.len(),
            started.elapsed().as_millis() as u64,
        )
    }

    async fn poll_creation(&self, fired: OperationResult) -> OperationResult {
        let Some(url) = fired.operation_url.clone() else {
            return fired;
        };
        match self
            .manager
            .wait_for_completion(&url, self.config.completion_timeout)
            .await
        {
            Ok(terminal) => {
                let mut terminal = terminal
                    .with_devices(fired.device_ids.clone(), fired.device_serials.clone());
                terminal.operation_type = OperationType::Create;
                terminal
            }
            Err(err) => {
                warn!("completion poll for {url} failed: {err}");
                OperationResult::failed(OperationType::Create, err.to_string())
                    .with_devices(fired.device_ids, fired.device_serials)
            }
        }
    }

    /// Pulls refreshed inventory so newly created devices gain identifiers.
    /// Skipped with a log line when no sync port is configured.
    async fn run_refresh_phase(&self) -> Option<PhaseResult> {
        let Some(sync) = &self.sync else {
            info!("no sync port configured, skipping inventory refresh");
            return None;
        };

        let started = Instant::now();
        if let Err(err) = sync.sync_devices().await {
            error!("device inventory refresh failed: {err}");
        }
        if let Err(err) = sync.sync_subscriptions().await {
            error!("subscription inventory refresh failed: {err}");
        }

        Some(PhaseResult::from_operations(
            Phase::Refresh,
            Vec::new(),
            0,
            started.elapsed().as_millis() as u64,
        ))
    }

    /// Re-resolves the serials created this run and re-runs the attribute
    /// loop against them. Skipped with a log line when no lookup port is
    /// configured.
    async fn run_new_device_phase(
        &self,
        originals: &[DeviceAssignment],
        created_serials: &[SerialNumber],
    ) -> Option<PhaseResult> {
        let Some(lookup) = &self.lookup else {
            info!("no lookup port configured, skipping new-device patching");
            return None;
        };

        let resolved = match lookup.find_by_serials(created_serials).await {
            Ok(resolved) => resolved,
            Err(err) => {
                error!("re-resolving created devices failed: {err}");
                return None;
            }
        };

        let by_serial: HashMap<&str, &DeviceAssignment> = originals
            .iter()
            .map(|a| (a.serial_number.as_str(), a))
            .collect();
        let refreshed: Vec<DeviceAssignment> = resolved
            .into_iter()
            .map(|fresh| match by_serial.get(fresh.serial_number.as_str()) {
                Some(original) => fresh.with_selections_from(original),
                None => fresh,
            })
            .collect();
        info!(
            "patching {} newly created devices ({} serials requested)",
            refreshed.len(),
            created_serials.len()
        );

        Some(self.run_attribute_phase(Phase::NewDevices, &refreshed).await)
    }

    fn aggregate(
        &self,
        phase_results: Vec<PhaseResult>,
        new_devices_added: Vec<SerialNumber>,
        new_devices_failed: Vec<SerialNumber>,
        elapsed: Duration,
    ) -> ApplyResult {
        let operations: Vec<OperationResult> = phase_results
            .iter()
            .flat_map(|phase| phase.operations.iter().cloned())
            .collect();

        let mut devices_created = 0usize;
        let mut applications_assigned = 0usize;
        let mut subscriptions_assigned = 0usize;
        let mut tags_updated = 0usize;
        for op in operations.iter().filter(|op| op.success) {
            let covered = op.device_serials.len().max(op.device_ids.len());
            match op.operation_type {
                OperationType::Create => devices_created += covered,
                OperationType::Application => applications_assigned += covered,
                OperationType::Subscription => subscriptions_assigned += covered,
                OperationType::Tags => tags_updated += covered,
                _ => {}
            }
        }

        let failed = operations.iter().filter(|op| !op.success).count();
        if failed > 0 {
            warn!("bulk assignment run finished with {failed} failed operations");
        } else {
            info!("bulk assignment run finished cleanly");
        }

        ApplyResult {
            success: failed == 0,
            operations,
            phase_results,
            devices_created,
            applications_assigned,
            subscriptions_assigned,
            tags_updated,
            new_devices_added,
            new_devices_failed,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}
