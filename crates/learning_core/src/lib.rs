//! Review learning core: pure domain logic with no database dependency.
//!
//! - [`hash`]: canonical JSON fingerprints for idempotent writes
//! - [`signal`]: approval / feedback normalization into bounded signals
//! - [`writer`]: exactly-once append of learning events
//! - [`feed`]: the merged, cursor-paginated decision event stream
//! - [`ports`]: storage traits implemented by adapters
//! - [`memory`]: in-memory adapter for tests and local runs

pub mod error;
pub mod feed;
pub mod hash;
pub mod memory;
pub mod ports;
pub mod signal;
pub mod types;
pub mod writer;

pub use error::{FieldError, LearningError, Result};
pub use feed::{
    Cursor, DecisionEvent, DecisionEventKind, DecisionEventType, DecisionFeed, DecisionPage,
    FeedQuery,
};
pub use types::{AgentIdentity, LearningDecisionType, LearningEvent};
pub use writer::{LearningEventWriter, WriteOutcome, WriteStrategy};
