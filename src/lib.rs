//! Client for a backend's live-voting API: follows a voting's event stream
//! into a deduplicated tally, and walks a visitor through casting one ballot
//! from a public voting link.

pub mod config;
pub mod error;
pub mod sse;
pub mod tally;
pub mod voting;

pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, FlowError, StreamError};
pub use sse::{ConnectionState, LiveTally, LiveVoteFeed, StreamTarget, VoteEvent, VoteStreamClient};
pub use tally::VoteAggregator;
pub use voting::{HttpVotingApi, PublicVotingFlow, Stage, VotingApi};
