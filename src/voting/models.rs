use serde::{Deserialize, Serialize};

/// What a scanned voting link carries before any network call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicLink {
    pub token: Option<String>,
    pub property_id: Option<i64>,
    pub voting_id: Option<i64>,
}

/// Property and voting a public link refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingScope {
    pub property_id: i64,
    pub voting_id: i64,
    pub group_id: Option<i64>,
}

// Request/Response DTOs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicContext {
    #[serde(default)]
    pub voting_title: Option<String>,
    #[serde(default, alias = "hp_name")]
    pub property_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

/// Identity-proving input collected from the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentLookup {
    pub document: String,
    pub unit: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateRequest<'a> {
    pub token: &'a str,
    pub hp_id: i64,
    pub voting_id: i64,
    pub document: &'a str,
    pub unit: &'a str,
}

/// A voting-session credential bound to one resident and one voting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionGrant {
    #[serde(alias = "voting_token", alias = "session_token")]
    pub token: String,
    #[serde(default, alias = "name")]
    pub resident_name: String,
    #[serde(default, alias = "unit_name")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VotingSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotOption {
    pub id: i64,
    #[serde(alias = "option_text")]
    pub text: String,
    #[serde(default, alias = "option_code")]
    pub code: Option<String>,
    #[serde(default, alias = "display_order")]
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriorChoice {
    pub option_id: i64,
    #[serde(default, alias = "text")]
    pub option_text: Option<String>,
    #[serde(default, alias = "code")]
    pub option_code: Option<String>,
    #[serde(default)]
    pub voted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptionResult {
    pub option_id: i64,
    #[serde(default)]
    pub option_text: Option<String>,
    pub votes: u64,
}

/// Response of the voting-session info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VotingInfo {
    pub voting: VotingSummary,
    #[serde(default)]
    pub options: Vec<BallotOption>,
    #[serde(default, alias = "already_voted")]
    pub has_voted: bool,
    #[serde(default, alias = "user_vote")]
    pub my_vote: Option<PriorChoice>,
    #[serde(default)]
    pub results: Option<Vec<OptionResult>>,
}

#[derive(Debug, Serialize)]
pub struct CastVoteRequest {
    pub option_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoteResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// The ballot as presented in the `voting` stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotView {
    Open {
        voting: VotingSummary,
        options: Vec<BallotOption>,
    },
    /// Options are never exposed once the resident has voted.
    AlreadyVoted {
        voting: VotingSummary,
        choice: Option<PriorChoice>,
        results: Option<Vec<OptionResult>>,
    },
}

impl BallotView {
    pub fn from_info(info: VotingInfo) -> Self {
        if info.has_voted {
            return BallotView::AlreadyVoted {
                voting: info.voting,
                choice: info.my_vote,
                results: info.results,
            };
        }

        let mut options = info.options;
        options.sort_by_key(|o| o.order);
        BallotView::Open {
            voting: info.voting,
            options,
        }
    }

    pub fn voting(&self) -> &VotingSummary {
        match self {
            BallotView::Open { voting, .. } | BallotView::AlreadyVoted { voting, .. } => voting,
        }
    }

    pub fn options(&self) -> &[BallotOption] {
        match self {
            BallotView::Open { options, .. } => options,
            BallotView::AlreadyVoted { .. } => &[],
        }
    }

    /// Finds an option by id or, failing that, by its code.
    pub fn find_option(&self, key: &str) -> Option<&BallotOption> {
        let options = self.options();
        key.parse::<i64>()
            .ok()
            .and_then(|id| options.iter().find(|o| o.id == id))
            .or_else(|| {
                options
                    .iter()
                    .find(|o| o.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(key)))
            })
    }
}
