//! # ptassist-core
//!
//! Validation and editing core for public-transport route relations.
//!
//! - **Transport modes**: whether a mode may travel a way in a direction, serve a
//!   route relation, and turn between two ways at a node ([`TransportMode`])
//! - **Route traversal**: a lazy, cancellable walk over a route relation's ways
//!   yielding gaps, illegal turns and mode mismatches ([`RouteValidator`])
//! - **Membership rewriting**: find every relation referencing a primitive and plan
//!   a copy-on-write [`EditSet`] handing those memberships to a replacement
//! - **Transactions**: all-or-nothing application of edit sets on a [`Dataset`]
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use ptassist_core::{plan_replacement, Dataset, PrimitiveRef, RouteValidator};
//!
//! fn main() -> ptassist_common::Result<()> {
//!     let mut dataset = Dataset::load("routes.json")?;
//!
//!     let validator = RouteValidator::new(&dataset);
//!     for id in validator.route_relations() {
//!         let report = validator.validate(id, None)?;
//!         println!("relation {id}: {} finding(s)", report.findings.len());
//!     }
//!
//!     let (old, new) = (PrimitiveRef::node(1), PrimitiveRef::node(2));
//!     let edits = plan_replacement(&dataset, old, new, "platform")?;
//!     let mut tx = dataset.begin();
//!     tx.apply_edit_set(&edits)?;
//!     tx.commit();
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod edit;
pub mod fix;
pub mod membership;
pub mod mode;
pub mod platform;
pub mod primitives;
pub mod replace;
pub mod restrictions;
pub mod store;
pub mod tag_lookup;
pub mod traversal;

pub use cancel::CancellationToken;
pub use config::{SeedPolicy, ValidatorConfig};
pub use dataset::{Dataset, Transaction};
pub use edit::{EditSet, RelationEdit};
pub use fix::{Fix, FixOutcome, FixTask};
pub use membership::{MembershipIndex, RelationToChildReference};
pub use mode::{Direction, TransportMode};
pub use platform::{plan_platform_transfer, stop_kind, PlatformTransfer, StopKind};
pub use primitives::{Member, MemberKind, Node, PrimitiveRef, Relation, Tags, Way};
pub use replace::plan_replacement;
pub use restrictions::{TurnRestrictionIndex, TurnRuleKind};
pub use store::GraphStore;
pub use traversal::{
    Finding, FindingKind, RouteReport, RouteTraversal, RouteValidator, TraversalSummary,
};
