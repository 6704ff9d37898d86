//! Admission control for the staging stage.
//!
//! A single [`AdmissionController`] bounds how many staging transfers run at
//! once across the whole run. Permits are released when dropped, so every
//! exit path of the holder (success, error, panic, task abort) frees the slot.

mod controller;

pub use controller::{AdmissionController, AdmissionError, AdmissionPermit, PoolStatus};
