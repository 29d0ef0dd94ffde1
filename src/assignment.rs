//! Desired-state assignment rows and their derived patch predicates.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, SerialNumber, TagMap};

/// One row of desired work for one device.
///
/// Identity is the serial number; `device_id` is present only once the device
/// exists in inventory, and its presence is the sole discriminator between
/// "existing" and "new". The record is immutable after construction; the
/// `needs_*` predicates are computed on every call so they always reflect the
/// snapshot they were built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAssignment {
    /// Manufacturer serial number, always present.
    pub serial_number: SerialNumber,
    /// Provider device identifier, absent until the device is registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,

    /// Device type as reported by the inventory or the spreadsheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Hardware model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Region the device currently lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Subscription currently held, as last observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_subscription_id: Option<String>,
    /// Application currently held, as last observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_application_id: Option<String>,
    /// Tags currently held, as last observed.
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub current_tags: TagMap,

    /// Subscription the user selected for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_subscription_id: Option<String>,
    /// Application the user selected for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_application_id: Option<String>,
    /// Region the user selected alongside the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_region: Option<String>,
    /// Tags the user selected for this device.
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub selected_tags: TagMap,

    /// Suppress the subscription patch even if a selection is present.
    #[serde(default)]
    pub keep_current_subscription: bool,
    /// Suppress the application patch even if a selection is present.
    #[serde(default)]
    pub keep_current_application: bool,
    /// Suppress the tag patch even if a selection is present.
    #[serde(default)]
    pub keep_current_tags: bool,
}

impl DeviceAssignment {
    /// Minimal row for a serial not yet matched to inventory.
    pub fn new(serial_number: impl Into<SerialNumber>) -> Self {
        Self {
            serial_number: serial_number.into(),
            device_id: None,
            device_type: None,
            model: None,
            region: None,
            current_subscription_id: None,
            current_application_id: None,
            current_tags: TagMap::new(),
            selected_subscription_id: None,
            selected_application_id: None,
            selected_region: None,
            selected_tags: TagMap::new(),
            keep_current_subscription: false,
            keep_current_application: false,
            keep_current_tags: false,
        }
    }

    /// True when the device is absent from inventory and must be registered.
    pub fn needs_creation(&self) -> bool {
        self.device_id.is_none()
    }

    /// True when an application should be assigned: the device exists, the
    /// keep-flag is clear, no application is currently held, and one was
    /// selected. An already-held application is never overwritten.
    pub fn needs_application_patch(&self) -> bool {
        self.device_id.is_some()
            && !self.keep_current_application
            && self.current_application_id.is_none()
            && self.selected_application_id.is_some()
    }

    /// True when a subscription should be assigned, by the same gap-fill rule
    /// as [`Self::needs_application_patch`].
    pub fn needs_subscription_patch(&self) -> bool {
        self.device_id.is_some()
            && !self.keep_current_subscription
            && self.current_subscription_id.is_none()
            && self.selected_subscription_id.is_some()
    }

    /// True when the selected tag set is non-empty and differs from the
    /// currently held tags.
    pub fn needs_tag_patch(&self) -> bool {
        self.device_id.is_some()
            && !self.keep_current_tags
            && !self.selected_tags.is_empty()
            && self.selected_tags != self.current_tags
    }

    /// Region to send alongside an application assignment: the selected
    /// region when present, otherwise the device's observed region.
    pub fn application_region(&self) -> Option<&str> {
        self.selected_region
            .as_deref()
            .or(self.region.as_deref())
    }

    /// Rebuilds a freshly resolved inventory record with the user selections
    /// and keep-flags of the original spreadsheet row. Used after new-device
    /// creation, when the lookup port returns records that carry the new
    /// `device_id` and observed state but none of the user intent.
    pub fn with_selections_from(mut self, original: &DeviceAssignment) -> Self {
        self.selected_subscription_id = original.selected_subscription_id.clone();
        self.selected_application_id = original.selected_application_id.clone();
        self.selected_region = original.selected_region.clone();
        self.selected_tags = original.selected_tags.clone();
        self.keep_current_subscription = original.keep_current_subscription;
        self.keep_current_application = original.keep_current_application;
        self.keep_current_tags = original.keep_current_tags;
        self
    }

    /// True when a subscription was selected but no application is held or
    /// selected. The provider requires application-before-subscription, so
    /// such a subscription call is predicted to fail; it is logged at
    /// classify time and still attempted.
    pub fn subscription_without_application(&self) -> bool {
        self.selected_subscription_id.is_some()
            && self.current_application_id.is_none()
            && self.selected_application_id.is_none()
    }
}
