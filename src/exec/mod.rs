//! Batched executors driving the external device-manager port.

/// Device lifecycle actions (archive, unarchive, remove).
pub mod action;
/// Fire-then-poll execution of attribute batches.
pub mod attribute;
