//! Grouping and chunking of pending attribute changes into batches.

use hashbrown::HashMap;

use crate::{
    assignment::DeviceAssignment,
    types::{AttributeKind, DeviceId, SerialNumber, TagMap, MAX_BATCH_SIZE},
};

/// Target value shared by every device in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchKey {
    /// Application and region travel together; the provider requires the
    /// region alongside the application.
    Application {
        /// Network application to assign.
        application_id: String,
        /// Region to assign with it.
        region: String,
    },
    /// Subscription target.
    Subscription {
        /// Subscription to assign.
        subscription_id: String,
    },
    /// Full tag set to apply, sorted by key. Distinct tag sets are never
    /// merged into one call.
    Tags {
        /// Sorted key/value pairs.
        tags: Vec<(String, String)>,
    },
}

impl BatchKey {
    /// Rebuilds the tag map for a [`BatchKey::Tags`] key. `None` for other
    /// variants.
    pub fn tag_map(&self) -> Option<TagMap> {
        match self {
            Self::Tags { tags } => Some(tags.iter().cloned().collect()),
            _ => None,
        }
    }
}

/// Identifier pair for one device inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDevice {
    /// Provider device identifier.
    pub device_id: DeviceId,
    /// Serial number, carried for reporting.
    pub serial_number: SerialNumber,
}

/// One planned external call: a target value and at most
/// [`MAX_BATCH_SIZE`] devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    /// Shared target value.
    pub key: BatchKey,
    /// Devices covered by this call.
    pub devices: Vec<BatchDevice>,
}

impl PlannedBatch {
    /// Provider identifiers of the covered devices.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.device_id.clone()).collect()
    }

    /// Serial numbers of the covered devices.
    pub fn device_serials(&self) -> Vec<SerialNumber> {
        self.devices
            .iter()
            .map(|d| d.serial_number.clone())
            .collect()
    }
}

/// Groups a homogeneous set of assignments by target value and slices each
/// group into chunks of at most [`MAX_BATCH_SIZE`] devices.
///
/// Output order is first-encountered-group, then chunk order within the
/// group; groups are never interleaved or rebalanced. Rows without a
/// provider device id, or without the fields the key needs, are skipped.
pub fn plan_batches<'a, I>(kind: AttributeKind, assignments: I) -> Vec<PlannedBatch>
where
    I: IntoIterator<Item = &'a DeviceAssignment>,
{
    let mut order: Vec<BatchKey> = Vec::new();
    let mut groups: HashMap<BatchKey, Vec<BatchDevice>> = HashMap::new();

    for assignment in assignments {
        let Some(device_id) = assignment.device_id.clone() else {
            continue;
        };
        let Some(key) = key_for(kind, assignment) else {
            continue;
        };

        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        group.push(BatchDevice {
            device_id,
            serial_number: assignment.serial_number.clone(),
        });
    }

    let mut batches = Vec::new();
    for key in order {
        let devices = groups.remove(&key).unwrap_or_default();
        for chunk in devices.chunks(MAX_BATCH_SIZE) {
            batches.push(PlannedBatch {
                key: key.clone(),
                devices: chunk.to_vec(),
            });
        }
    }
    batches
}

fn key_for(kind: AttributeKind, assignment: &DeviceAssignment) -> Option<BatchKey> {
    match kind {
        AttributeKind::Application => {
            let application_id = assignment.selected_application_id.clone()?;
            let region = assignment.application_region()?.to_string();
            Some(BatchKey::Application {
                application_id,
                region,
            })
        }
        AttributeKind::Subscription => {
            let subscription_id = assignment.selected_subscription_id.clone()?;
            Some(BatchKey::Subscription { subscription_id })
        }
        AttributeKind::Tags => {
            if assignment.selected_tags.is_empty() {
                return None;
            }
            let mut tags: Vec<(String, String)> = assignment
                .selected_tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            tags.sort();
            Some(BatchKey::Tags { tags })
        }
    }
}
