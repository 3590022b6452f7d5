//! Rowguard core: row-level authorization for the social/messaging store.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Request handling layer                       │
//! │  ┌───────────┐   ┌──────────────┐   ┌─────────────────────────┐  │
//! │  │ Principal │──▶│ PolicyEngine │──▶│ execute against store   │  │
//! │  └───────────┘   └──────┬───────┘   └─────────────────────────┘  │
//! │                         │                                        │
//! │          ┌──────────────┼─────────────────┐                      │
//! │  ┌───────▼──────┐ ┌─────▼──────────┐ ┌────▼───────┐              │
//! │  │ PolicyTable  │ │ Relationship   │ │ DenialSink │              │
//! │  │ (immutable)  │ │ Resolver (SQL) │ │ (audit)    │              │
//! │  └──────────────┘ └────────────────┘ └────────────┘              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is stateless between calls. Writes get a binary decision,
//! reads get the visible subset of the candidate rows.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod guarded;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod store;

pub use audit::{
    DenialEvent, DenialSink, FanoutDenialSink, FileDenialSink, MemoryDenialSink, NullDenialSink,
    TracingDenialSink,
};
pub use config::{AuditConfig, AuditSinkKind, EngineConfig};
pub use engine::{Decision, PolicyEngine, RowFilter, RowSet, Target};
pub use error::{reason_codes, AccessError, Denial, DenialKind};
pub use guarded::{FriendRequestOutcome, GuardError, GuardedStore};
pub use policy::{Access, PolicyRule, PolicyTable};
pub use principal::Principal;
pub use resolver::{CancelFlag, RelationshipResolver, ResolveError, RowFetcher, SqliteResolver};
pub use store::{SocialStore, StoreError};

pub use rowguard_common as types;
