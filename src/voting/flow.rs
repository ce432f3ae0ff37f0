use crate::error::FlowError;
use crate::sse::StreamTarget;
use crate::voting::api::VotingApi;
use crate::voting::models::{
    BallotView, PublicContext, PublicLink, ResidentLookup, SessionGrant, VotingScope,
};
use crate::voting::token::TokenHint;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Context,
    Validation,
    Voting,
    Progress,
    Error(String),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Context => "context",
            Stage::Validation => "validation",
            Stage::Voting => "voting",
            Stage::Progress => "progress",
            Stage::Error(_) => "error",
        }
    }
}

/// Walks an anonymous visitor from a scanned link to one cast ballot.
///
/// Stages only move forward: `context`, `validation`, `voting`, `progress`.
/// Failures while resolving the link, validating the resident or loading the
/// ballot land in `error`, from which [`PublicVotingFlow::retry`] starts over.
/// A rejected vote keeps the flow in `voting` with a notice so it can be
/// retried.
///
/// The public token is sent once, in the validation exchange. From then on
/// only the voting-session token is used.
pub struct PublicVotingFlow<A> {
    api: A,
    link: PublicLink,
    progress_delay: Duration,
    stage: Stage,
    scope: Option<VotingScope>,
    context: Option<PublicContext>,
    session: Option<SessionGrant>,
    ballot: Option<BallotView>,
    notice: Option<String>,
    vote_recorded: bool,
}

impl<A: VotingApi> PublicVotingFlow<A> {
    pub fn new(api: A, link: PublicLink, progress_delay: Duration) -> Self {
        Self {
            api,
            link,
            progress_delay,
            stage: Stage::Context,
            scope: None,
            context: None,
            session: None,
            ballot: None,
            notice: None,
            vote_recorded: false,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn scope(&self) -> Option<&VotingScope> {
        self.scope.as_ref()
    }

    pub fn context(&self) -> Option<&PublicContext> {
        self.context.as_ref()
    }

    pub fn session(&self) -> Option<&SessionGrant> {
        self.session.as_ref()
    }

    pub fn ballot(&self) -> Option<&BallotView> {
        self.ballot.as_ref()
    }

    /// Last dismissible message for the visitor.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Works out which property and voting the link refers to and confirms
    /// it with the backend. Identifiers missing from the link are read from
    /// the token payload as a display hint only.
    pub async fn resolve_context(&mut self) -> Result<VotingScope, FlowError> {
        self.expect_stage(&Stage::Context)?;

        let Some(token) = self.link.token.clone().filter(|t| !t.is_empty()) else {
            return Err(self.fail(FlowError::MissingToken));
        };

        let hint = if self.link.property_id.is_none() || self.link.voting_id.is_none() {
            TokenHint::extract(&token)
        } else {
            TokenHint::Unresolved
        };

        let (Some(property_id), Some(voting_id)) = (
            self.link.property_id.or(hint.property_id()),
            self.link.voting_id.or(hint.voting_id()),
        ) else {
            return Err(self.fail(FlowError::MissingScope));
        };

        let context = match self.api.fetch_context(property_id, voting_id).await {
            Ok(context) => context,
            Err(e) => return Err(self.fail(e.into())),
        };

        let scope = VotingScope {
            property_id,
            voting_id,
            group_id: context.group_id.or(hint.group_id()),
        };
        self.scope = Some(scope);
        self.context = Some(context);
        self.advance(Stage::Validation);
        Ok(scope)
    }

    /// Exchanges the public token plus the resident's details for a
    /// voting-session token.
    pub async fn validate(&mut self, lookup: &ResidentLookup) -> Result<&SessionGrant, FlowError> {
        self.expect_stage(&Stage::Validation)?;

        let Some(scope) = self.scope else {
            return Err(self.fail(FlowError::MissingScope));
        };
        let Some(token) = self.link.token.clone() else {
            return Err(self.fail(FlowError::MissingToken));
        };

        let grant = match self.api.exchange_token(&token, &scope, lookup).await {
            Ok(grant) => grant,
            Err(e) => return Err(self.fail(e.into())),
        };

        info!(
            "Validated {} ({}) for voting {}",
            grant.resident_name, grant.unit, scope.voting_id
        );
        self.advance(Stage::Voting);
        Ok(self.session.insert(grant))
    }

    /// Fetches the ballot with the voting-session token. A resident who has
    /// already voted gets their earlier choice and no options.
    pub async fn load_ballot(&mut self) -> Result<&BallotView, FlowError> {
        self.expect_stage(&Stage::Voting)?;

        let Some(session_token) = self.session.as_ref().map(|s| s.token.clone()) else {
            return Err(self.fail(FlowError::MissingToken));
        };

        let view = match self.api.fetch_ballot(&session_token).await {
            Ok(info) => BallotView::from_info(info),
            Err(e) => return Err(self.fail(e.into())),
        };

        if matches!(view, BallotView::AlreadyVoted { .. }) {
            info!("Resident already voted, skipping ballot");
            self.vote_recorded = true;
        }
        Ok(self.ballot.insert(view))
    }

    /// Sends the resident's single vote. A rejection leaves the flow in
    /// `voting` with a notice so the visitor may try again.
    pub async fn cast_vote(&mut self, option_id: i64) -> Result<(), FlowError> {
        self.expect_stage(&Stage::Voting)?;

        let ballot = self.ballot.as_ref().ok_or(FlowError::NoBallot)?;
        if self.vote_recorded || matches!(ballot, BallotView::AlreadyVoted { .. }) {
            return Err(FlowError::AlreadyVoted);
        }
        if !ballot.options().iter().any(|o| o.id == option_id) {
            return Err(FlowError::UnknownOption(option_id));
        }
        let session_token = self
            .session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(FlowError::MissingToken)?;

        match self.api.cast_vote(&session_token, option_id).await {
            Ok(_) => {
                info!("Vote recorded for option {option_id}");
                self.notice = None;
                self.vote_recorded = true;
                Ok(())
            }
            Err(e) => {
                warn!("Vote rejected: {e}");
                self.notice = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Waits the fixed delay after a recorded (or earlier) vote, then moves
    /// to the read-only `progress` stage. Returns the stream to follow when
    /// the voting's group is known.
    pub async fn proceed(&mut self) -> Result<Option<StreamTarget>, FlowError> {
        self.expect_stage(&Stage::Voting)?;
        if !self.vote_recorded {
            return Err(FlowError::BallotPending);
        }

        tokio::time::sleep(self.progress_delay).await;
        self.advance(Stage::Progress);
        Ok(self.progress_target())
    }

    pub fn progress_target(&self) -> Option<StreamTarget> {
        if self.stage != Stage::Progress {
            return None;
        }
        let scope = self.scope?;
        StreamTarget::from_parts(Some(scope.property_id), scope.group_id, Some(scope.voting_id))
    }

    /// Credential for following progress: the voting-session token.
    pub fn session_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    /// Restarts from `context` after an error. Returns whether a restart
    /// happened.
    pub fn retry(&mut self) -> bool {
        if !matches!(self.stage, Stage::Error(_)) {
            return false;
        }
        self.scope = None;
        self.context = None;
        self.session = None;
        self.ballot = None;
        self.notice = None;
        self.vote_recorded = false;
        self.advance(Stage::Context);
        true
    }

    fn expect_stage(&self, expected: &Stage) -> Result<(), FlowError> {
        if &self.stage == expected {
            Ok(())
        } else {
            Err(FlowError::WrongStage {
                actual: self.stage.name(),
            })
        }
    }

    fn advance(&mut self, next: Stage) {
        info!("Voting flow: {} -> {}", self.stage.name(), next.name());
        self.stage = next;
    }

    fn fail(&mut self, error: FlowError) -> FlowError {
        warn!("Voting flow failed in {} stage: {error}", self.stage.name());
        let message = error.to_string();
        self.notice = Some(message.clone());
        self.stage = Stage::Error(message);
        error
    }
}
