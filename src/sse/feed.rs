use crate::sse::client::{StreamOutcome, VoteStreamClient};
use crate::sse::models::{ConnectionState, StreamEvent, StreamTarget, VoteEvent};
use crate::tally::VoteAggregator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything a renderer needs about one live voting: connection state plus
/// the aggregated votes. Only the stream read loop writes to it.
#[derive(Debug, Clone, Default)]
pub struct LiveTally {
    state: ConnectionState,
    aggregator: VoteAggregator,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl LiveTally {
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn votes(&self) -> &[VoteEvent] {
        self.aggregator.votes()
    }

    pub fn total_count(&self) -> u64 {
        self.aggregator.total_count()
    }

    pub fn is_authoritative(&self) -> bool {
        self.aggregator.is_authoritative()
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Applies one decoded event. Returns whether observers should be woken.
    pub(crate) fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Connected => {
                info!("Vote stream connected");
                self.state = ConnectionState::Connected;
                true
            }
            StreamEvent::Vote(vote) => {
                let id = vote.id;
                let inserted = self.aggregator.append_vote(vote);
                if !inserted {
                    debug!("Ignoring duplicate vote {id}");
                }
                inserted
            }
            StreamEvent::PreloadComplete(preload) => {
                info!("Preload complete, {} votes in total", preload.total_votes);
                self.aggregator.reconcile_total(preload.total_votes);
                true
            }
            StreamEvent::Heartbeat => {
                self.last_heartbeat = Some(Utc::now());
                false
            }
            StreamEvent::Unknown(kind) => {
                debug!("Ignoring unknown stream event `{kind}`");
                false
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.aggregator.reset();
        self.last_heartbeat = None;
    }
}

struct ActiveStream {
    target: StreamTarget,
    cancel: CancellationToken,
    task: JoinHandle<StreamOutcome>,
}

/// Owns the live tally for one voting at a time and the background task that
/// keeps it current.
///
/// Readers subscribe to a `watch` channel. Switching to another voting or
/// disabling the feed clears the tally; a failed or closed connection keeps
/// it until the consumer explicitly enables the feed again.
pub struct LiveVoteFeed {
    client: VoteStreamClient,
    tally: Arc<watch::Sender<LiveTally>>,
    active: Option<ActiveStream>,
}

impl LiveVoteFeed {
    pub fn new(client: VoteStreamClient) -> Self {
        let (tx, _rx) = watch::channel(LiveTally::default());
        Self {
            client,
            tally: Arc::new(tx),
            active: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveTally> {
        self.tally.subscribe()
    }

    pub fn snapshot(&self) -> LiveTally {
        self.tally.borrow().clone()
    }

    pub fn target(&self) -> Option<StreamTarget> {
        self.active.as_ref().map(|active| active.target)
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Starts streaming `target`.
    ///
    /// A no-op while a connection for the same target is still running.
    /// A different target tears the current one down first and starts from an
    /// empty tally. Re-enabling the same target after an error or a server
    /// close reconnects and keeps what was already aggregated.
    pub async fn enable(&mut self, target: StreamTarget) {
        if let Some(active) = &self.active {
            if active.target == target && !active.task.is_finished() {
                return;
            }
            if active.target != target {
                self.disable().await;
            }
        }
        self.start(target);
    }

    /// Reconnects the last enabled target, if any.
    pub async fn reconnect(&mut self) {
        if let Some(target) = self.target() {
            self.enable(target).await;
        }
    }

    /// Stops the stream and clears the tally. Once this returns, the read loop
    /// has finished and will not touch the tally again.
    pub async fn disable(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            match active.task.await {
                Ok(outcome) => debug!("Vote stream for {} ended: {outcome:?}", active.target),
                Err(e) => error!("Vote stream task for {} failed: {e}", active.target),
            }
        }
        self.tally.send_modify(LiveTally::reset);
    }

    fn start(&mut self, target: StreamTarget) {
        let cancel = CancellationToken::new();
        let client = self.client.clone();
        let tally = Arc::clone(&self.tally);
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move { client.run(target, &tally, &task_cancel).await });

        self.active = Some(ActiveStream {
            target,
            cancel,
            task,
        });
    }
}

impl Drop for LiveVoteFeed {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::models::PreloadComplete;
    use crate::sse::parser::EventStreamParser;

    fn feed_bytes(tally: &mut LiveTally, parser: &mut EventStreamParser, bytes: &[u8]) {
        for record in parser.feed(bytes) {
            if let Ok(event) = record.decode() {
                tally.apply(event);
            }
        }
    }

    #[test]
    fn scenario_reconciles_total_but_keeps_observed_votes() {
        let mut tally = LiveTally::default();
        let mut parser = EventStreamParser::new();
        tally.set_state(ConnectionState::Connecting);

        feed_bytes(
            &mut tally,
            &mut parser,
            b"event: connected\ndata: {\"voting_id\":100}\n\n\
              event: vote\ndata: {\"id\":1,\"voting_id\":100,\"option_id\":1}\n\n\
              event: preload_complete\ndata: {\"total_votes\":50}\n\n\
              event: vote\ndata: {\"id\":2,\"voting_id\":100,\"option_id\":2}\n\n",
        );

        assert_eq!(tally.state(), &ConnectionState::Connected);
        let ids: Vec<i64> = tally.votes().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(tally.total_count(), 50);
        assert!(tally.is_authoritative());
    }

    #[test]
    fn malformed_vote_is_skipped() {
        let mut tally = LiveTally::default();
        let mut parser = EventStreamParser::new();

        feed_bytes(
            &mut tally,
            &mut parser,
            b"event: vote\ndata: {not json}\n\nevent: vote\ndata: {\"id\":5}\n\n",
        );

        assert_eq!(tally.votes().len(), 1);
        assert_eq!(tally.votes()[0].id, 5);
    }

    #[test]
    fn heartbeat_and_unknown_events_do_not_wake_observers() {
        let mut tally = LiveTally::default();
        assert!(!tally.apply(StreamEvent::Heartbeat));
        assert!(tally.last_heartbeat().is_some());
        assert!(!tally.apply(StreamEvent::Unknown("poll_closed".into())));
        assert_eq!(tally.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn duplicate_vote_reports_no_change() {
        let mut tally = LiveTally::default();
        let vote = VoteEvent {
            id: 3,
            ..VoteEvent::default()
        };
        assert!(tally.apply(StreamEvent::Vote(vote.clone())));
        assert!(!tally.apply(StreamEvent::Vote(vote)));
        assert_eq!(tally.total_count(), 1);
    }

    #[test]
    fn reset_returns_to_disconnected_and_empty() {
        let mut tally = LiveTally::default();
        tally.apply(StreamEvent::Connected);
        tally.apply(StreamEvent::PreloadComplete(PreloadComplete { total_votes: 8 }));
        tally.reset();

        assert_eq!(tally.state(), &ConnectionState::Disconnected);
        assert_eq!(tally.total_count(), 0);
        assert!(tally.last_heartbeat().is_none());
    }

    #[tokio::test]
    async fn missing_credential_moves_to_error() {
        let mut feed = LiveVoteFeed::new(VoteStreamClient::new("http://127.0.0.1:9", None));
        let mut rx = feed.subscribe();

        feed.enable(StreamTarget::new(1, 2, 3)).await;
        rx.wait_for(|t| t.state().is_error()).await.unwrap();

        assert_eq!(
            feed.snapshot().state(),
            &ConnectionState::Error("No credential available for the vote stream".into())
        );

        feed.disable().await;
        assert_eq!(feed.snapshot().state(), &ConnectionState::Disconnected);
        assert_eq!(feed.target(), None);
    }
}
