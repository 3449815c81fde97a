//! Sharded harvest pipeline and quarantine reconciliation engine.
//!
//! This crate drives the whole harvest run:
//!
//! - [`shard`] deterministically assigns ledger records to worker shards
//!   and classifies each shard's workload
//! - [`driver`] defines the browser capability interface the portal is
//!   reached through
//! - [`staging`] owns the scoped download directory for one record attempt
//! - [`worker`] walks each record through the
//!   folder → navigate → discover → download → upload state machine
//! - [`reconcile`] is the separate singleton job that deletes remote
//!   folders for ids no longer in the ledger, under the two-strike rule
//!
//! Shards are independent processes coordinating only through the ledger
//! and the remote store; within a shard, records are strictly sequential.

pub mod driver;
mod error;
pub mod reconcile;
pub mod shard;
pub mod staging;
pub mod worker;

pub use driver::{CandidateHandle, DriverError, DriverFactory, DriverSession};
pub use error::HarvestError;
pub use reconcile::{
    run_reconciliation, ReconcileError, ReconcileReport, ReconcileSettings,
};
pub use shard::{plan_shard, ShardAssignment, ShardPlan};
pub use staging::{StagingArea, StagingSettings};
pub use worker::{HarvestWorker, RecordOutcome, ShardReport, WorkerSettings};
