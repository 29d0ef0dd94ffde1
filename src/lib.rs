//! Phased, rate-limited bulk assignment of device attributes against an
//! external device-management API.
//!
//! The entry point is [`workflow::AssignmentWorkflow`]: it classifies a list
//! of [`assignment::DeviceAssignment`] rows into existing and new devices,
//! patches existing devices (application, then subscription, then tags, in
//! that hard provider-mandated order), creates missing devices behind a
//! POST-class [`gate::RateGate`], refreshes local inventory through an
//! optional sync port, and finally patches the devices it just created. A
//! failed batch is recorded and never halts the run; the returned
//! [`outcome::ApplyResult`] aggregates every per-batch outcome.
//!
//! Patching is gap-fill only: an attribute a device already holds is never
//! overwritten.
//!
//! # Examples
//!
//! Derived predicates are pure functions of the row, re-evaluated on every
//! read:
//! ```
//! use fleetassign::assignment::DeviceAssignment;
//!
//! let mut row = DeviceAssignment::new("SN-0001");
//! row.device_id = Some("dev-1".to_string());
//! row.selected_subscription_id = Some("sub-basic".to_string());
//! assert!(row.needs_subscription_patch());
//!
//! // A held value suppresses the patch: gap-fill only.
//! row.current_subscription_id = Some("sub-basic".to_string());
//! assert!(!row.needs_subscription_patch());
//! ```
//!
//! Batch planning groups by target value and chunks at the external API's
//! 25-device ceiling:
//! ```
//! use fleetassign::{
//!     assignment::DeviceAssignment,
//!     plan::plan_batches,
//!     types::AttributeKind,
//! };
//!
//! let rows: Vec<DeviceAssignment> = (0..30)
//!     .map(|i| {
//!         let mut row = DeviceAssignment::new(format!("SN-{i:04}"));
//!         row.device_id = Some(format!("dev-{i}"));
//!         row.selected_subscription_id = Some("sub-basic".to_string());
//!         row
//!     })
//!     .collect();
//!
//! let batches = plan_batches(AttributeKind::Subscription, rows.iter());
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[0].devices.len(), 25);
//! assert_eq!(batches[1].devices.len(), 5);
//! ```
#![deny(missing_docs)]

/// Assignment rows and derived patch predicates.
pub mod assignment;
/// Batched executors for attribute patches and lifecycle actions.
pub mod exec;
/// Fixed-interval call pacing.
pub mod gate;
/// Result snapshot types.
pub mod outcome;
/// Batch grouping and chunking.
pub mod plan;
/// External collaborator traits.
pub mod port;
/// Shared primitive types, enums, and API constants.
pub mod types;
/// The four-phase orchestrator.
pub mod workflow;
