pub mod api;
pub mod flow;
pub mod models;
pub mod token;

pub use api::{HttpVotingApi, VotingApi};
pub use flow::{PublicVotingFlow, Stage};
pub use models::*;
pub use token::TokenHint;
