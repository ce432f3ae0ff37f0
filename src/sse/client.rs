use crate::error::{StreamError, response_message};
use crate::sse::feed::LiveTally;
use crate::sse::models::{ConnectionState, StreamTarget};
use crate::sse::parser::EventStreamParser;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use std::pin::pin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a single stream connection ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// Torn down by the consumer; the tally was left untouched.
    Cancelled,
    /// The server finished the response body.
    Closed,
    Failed(StreamError),
}

/// Opens the per-voting event stream and feeds decoded records into a
/// [`LiveTally`].
#[derive(Clone)]
pub struct VoteStreamClient {
    http: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl VoteStreamClient {
    pub fn new(base_url: impl Into<String>, credential: Option<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, credential)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credential: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http,
            base_url,
            credential,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Runs one connection to completion.
    ///
    /// The cancellation token is checked at every suspension point and before
    /// each record is applied; once it fires, nothing more is written to
    /// `tally`. Failures are recorded as [`ConnectionState::Error`] without
    /// clearing the votes gathered so far.
    pub async fn run(
        &self,
        target: StreamTarget,
        tally: &watch::Sender<LiveTally>,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        if cancel.is_cancelled() {
            return StreamOutcome::Cancelled;
        }
        tally.send_modify(|t| t.set_state(ConnectionState::Connecting));
        info!("Opening vote stream for {target}");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            opened = self.open(&target) => opened,
        };
        let response = match opened {
            Ok(response) => response,
            Err(e) => return fail(tally, e),
        };

        let mut body = pin!(response.bytes_stream());
        let mut parser = EventStreamParser::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamOutcome::Cancelled,
                next = body.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return fail(tally, StreamError::Read(e.to_string())),
                None => {
                    if parser.has_pending() {
                        debug!("Discarding incomplete record at end of stream");
                    }
                    info!("Vote stream for {target} closed by server");
                    tally.send_modify(|t| t.set_state(ConnectionState::Disconnected));
                    return StreamOutcome::Closed;
                }
            };

            for record in parser.feed(&chunk) {
                if cancel.is_cancelled() {
                    return StreamOutcome::Cancelled;
                }
                match record.decode() {
                    Ok(event) => {
                        tally.send_if_modified(|t| t.apply(event));
                    }
                    Err(e) => warn!("Skipping stream record: {e}"),
                }
            }
        }
    }

    async fn open(&self, target: &StreamTarget) -> Result<reqwest::Response, StreamError> {
        let credential = self
            .credential
            .as_deref()
            .ok_or(StreamError::MissingCredential)?;

        let url = format!("{}{}", self.base_url, target.path());
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::HttpStatus {
                status: status.as_u16(),
                message: response_message(status.as_u16(), &body),
            });
        }

        Ok(response)
    }
}

fn fail(tally: &watch::Sender<LiveTally>, error: StreamError) -> StreamOutcome {
    warn!("Vote stream error: {error}");
    let message = error.to_string();
    tally.send_modify(|t| t.set_state(ConnectionState::Error(message)));
    StreamOutcome::Failed(error)
}
