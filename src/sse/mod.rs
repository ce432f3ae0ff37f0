pub mod models;
pub use models::*;

pub mod parser;
pub use parser::{EventStreamParser, SseRecord};

mod client;
mod feed;

pub use client::{StreamOutcome, VoteStreamClient};
pub use feed::{LiveTally, LiveVoteFeed};
