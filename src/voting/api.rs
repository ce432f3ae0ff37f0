use crate::error::ApiError;
use crate::voting::models::{
    CastVoteRequest, PublicContext, ResidentLookup, SessionGrant, ValidateRequest, VoteResponse,
    VotingInfo, VotingScope,
};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

/// Backend calls made by the public voting flow.
///
/// The public token is only ever an argument of [`VotingApi::exchange_token`];
/// every other call is either anonymous or carries the voting-session token.
pub trait VotingApi {
    fn fetch_context(
        &self,
        property_id: i64,
        voting_id: i64,
    ) -> impl Future<Output = Result<PublicContext, ApiError>> + Send;

    fn exchange_token(
        &self,
        public_token: &str,
        scope: &VotingScope,
        lookup: &ResidentLookup,
    ) -> impl Future<Output = Result<SessionGrant, ApiError>> + Send;

    fn fetch_ballot(
        &self,
        session_token: &str,
    ) -> impl Future<Output = Result<VotingInfo, ApiError>> + Send;

    fn cast_vote(
        &self,
        session_token: &str,
        option_id: i64,
    ) -> impl Future<Output = Result<VoteResponse, ApiError>> + Send;
}

#[derive(Clone)]
pub struct HttpVotingApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpVotingApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_body(status.as_u16(), &body));
    }
    Ok(response.json::<T>().await?)
}

impl VotingApi for HttpVotingApi {
    async fn fetch_context(
        &self,
        property_id: i64,
        voting_id: i64,
    ) -> Result<PublicContext, ApiError> {
        debug!("Fetching public context for voting {voting_id}");
        let response = self
            .http
            .get(self.url(&format!("/public/votings/{voting_id}/context")))
            .query(&[("hp_id", property_id)])
            .send()
            .await?;
        read_json(response).await
    }

    async fn exchange_token(
        &self,
        public_token: &str,
        scope: &VotingScope,
        lookup: &ResidentLookup,
    ) -> Result<SessionGrant, ApiError> {
        let request = ValidateRequest {
            token: public_token,
            hp_id: scope.property_id,
            voting_id: scope.voting_id,
            document: &lookup.document,
            unit: &lookup.unit,
        };
        let response = self
            .http
            .post(self.url("/public/votings/validate"))
            .json(&request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_ballot(&self, session_token: &str) -> Result<VotingInfo, ApiError> {
        let response = self
            .http
            .get(self.url("/public/voting-session"))
            .bearer_auth(session_token)
            .send()
            .await?;
        read_json(response).await
    }

    async fn cast_vote(&self, session_token: &str, option_id: i64) -> Result<VoteResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/public/voting-session/vote"))
            .bearer_auth(session_token)
            .json(&CastVoteRequest { option_id })
            .send()
            .await?;
        let vote: VoteResponse = read_json(response).await?;
        if !vote.success {
            return Err(ApiError::Status {
                status: 200,
                message: vote
                    .message
                    .unwrap_or_else(|| "Vote was not accepted".to_owned()),
            });
        }
        Ok(vote)
    }
}
