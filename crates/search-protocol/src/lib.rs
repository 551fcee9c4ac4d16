//! Search-Protocol: Streaming Result Protocol for the Search Job Engine
//!
//! This crate defines everything a search job exchanges with the outside
//! world: the matches and statistics it streams, the cancellation context it
//! runs under, the alerts and errors it reports, and the collaborators it
//! consults.
//!
//! ## Layer 0 - Protocol
//!
//! Focus: Data model, cancellation, and collaborator contracts. No job logic.
//!
//! ## Key Components
//!
//! - `Match` / `Stats` / `SearchEvent`: what flows through a `Sender`
//! - `JobContext`: cancellation token plus deadline and actor
//! - `JobError` / `Alert` / `Outcome`: what a job reports when it returns
//! - `Clients`: repository resolver, alert observer, permissions checker

pub mod alert;
pub mod collaborators;
pub mod context;
mod error;
pub mod event;
pub mod fakes;
mod inputs;
mod outcome;
pub mod repos;
pub mod result;
pub mod select;
pub mod stats;

pub use alert::{suggest_longer_timeout, Alert, MaxAlerter, ProposedQuery};
pub use collaborators::{
    actor_permissions, can_read_any_path, AlertObserver, AlertVerdict, Clients, Perms,
    RepoContent, RepoResolver, SubRepoPermsChecker,
};
pub use context::{Actor, CancelGuard, JobContext};
pub use error::{ContextError, ErrorSet, JobError, JobResult, MultiError};
pub use event::{sender_fn, AggregatingSender, DiscardSender, SearchEvent, Sender, SharedSender};
pub use inputs::{PatternType, Protocol, SearchInputs};
pub use outcome::Outcome;
pub use repos::{
    MinimalRepo, RepoId, RepoName, RepoOptions, RepositoryRevisions, ResolvedPage, ResolvedRepos,
    UseIndex,
};
pub use result::{
    ChunkMatch, CommitMatch, FileMatch, Location, Match, MatchKey, MatchKind, Range, RepoMatch,
    SymbolMatch,
};
pub use select::SelectPath;
pub use stats::{RepoStatus, RepoStatusMap, Stats};
