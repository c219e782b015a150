//! # Declarative
//!
//! Declarative resource reconciliation against REST backends that can only
//! be searched by listing.
//!
//! The crate converges remote entities on declared attribute records. It
//! resolves identity against list results, runs the create/read/update/delete
//! protocol around that resolution, encodes composite keys for relation
//! entities, and reports entities deleted out-of-band as drift.
//!
//! ## Core Concepts
//!
//! - **AttributeRecord**: tri-state attribute values, the unit read and written
//! - **ResourceKind**: static schema of one kind, including its identity
//! - **RemoteOperations**: the narrow list/write/update/delete surface of a backend
//! - **Engine**: stateless create/read/update/delete against a backend
//! - **ExecutionPlan**: changes needed to converge tracked state on declarations
//! - **Executor**: applies a plan with bounded parallelism
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{AttributeRecord, Engine, MockRemote, OperationContext, ReadOutcome};
//!
//! let remote = MockRemote::simulated();
//! let engine = Engine::new(&remote);
//! let ctx = OperationContext::new();
//!
//! let state = engine.create(&ctx, &PROJECT, &AttributeRecord::new().with("name", "Infra"))?;
//! match engine.read(&ctx, &PROJECT, &state)? {
//!     ReadOutcome::Present(refreshed) => println!("{}", refreshed.value("id")),
//!     ReadOutcome::Removed(drift) => println!("{} {} is gone", drift.kind, drift.id),
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`RemoteOperations`]: backend access, implemented by adapters
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific transports or UI frameworks.

pub mod composite;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod kind;
pub mod planner;
pub mod record;
pub mod remote;
pub mod resolver;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use context::{CancellationToken, OperationContext};
pub use diff::{AttributeChange, DiffSummary, ResourceDiff, group_by_kind};
pub use engine::{Drift, Engine, ReadOutcome};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{
    AutoConfirm, AutoDecline, ConfirmCallback, ExecuteReport, NoProgress, ProgressCallback,
    execute,
};
pub use kind::{AttrMode, AttrType, AttributeSpec, Identity, ResourceKind};
pub use planner::{ExecutionPlan, PlannedChange, ResourceEntry};
pub use record::AttributeRecord;
pub use remote::{
    ListScope, MockRemote, Operation, RecordedCall, RemoteEntity, RemoteError, RemoteOperations,
};
pub use resolver::{IdentityCandidate, IdentityDescriptor, resolve};
pub use types::{Action, ApplyResult, ExecuteOptions, ExecuteSummary};
pub use value::Value;
