//! rusty-shelf/crates/rs-core/src/lib.rs
//!
//! The engagement ledger and ranking engine: voter identity, votes, comment
//! threads with likes, and time-decayed ranking, with storage behind ports.

pub mod comments;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod ranking;
pub mod requests;
pub mod settings;
pub mod traits;

// Re-exporting for easier access in other crates
pub use engine::Engine;
pub use error::*;
pub use ledger::RepeatPolicy;
pub use models::*;
pub use ranking::{RankedItem, RankedList, ScoreMode};
pub use requests::{CommentRequest, RankRequest, Requester, VoteRequest};
pub use settings::*;
pub use traits::*;
