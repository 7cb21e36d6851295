//! Progress stream
//!
//! Polls the job store and turns job changes into `log`, `status`, `complete` and
//! `error` events for one observer. Dropping the stream drops its timer; the
//! pipeline never notices.

use std::collections::VecDeque;
use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use sitedrop_api::{CompletePayload, DeploymentResult, StreamErrorPayload};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::jobs::store::JobReader;

/// One event sent to a progress observer
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Log(String),
    Status(String),
    Complete(CompletePayload),
    Error(StreamErrorPayload),
}

impl ProgressEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Log(_) => "log",
            ProgressEvent::Status(_) => "status",
            ProgressEvent::Complete(_) => "complete",
            ProgressEvent::Error(_) => "error",
        }
    }

    /// Encode as a server-sent event with a JSON data field
    pub fn to_sse(&self) -> Result<Event, axum::Error> {
        let event = Event::default().event(self.name());
        match self {
            ProgressEvent::Log(line) => event.json_data(line),
            ProgressEvent::Status(status) => event.json_data(status),
            ProgressEvent::Complete(payload) => event.json_data(payload),
            ProgressEvent::Error(payload) => event.json_data(payload),
        }
    }
}

struct StreamState {
    reader: JobReader,
    id: String,
    offset: usize,
    history: Vec<String>,
    last_status: Option<String>,
    pending: VecDeque<ProgressEvent>,
    ticker: Interval,
    opened: bool,
    finished: bool,
}

impl StreamState {
    async fn poll(&mut self) {
        let Some(delta) = self.reader.delta(&self.id, self.offset).await else {
            self.pending.push_back(ProgressEvent::Error(StreamErrorPayload {
                message: format!("Deployment not found: {}", self.id),
            }));
            self.finished = true;
            return;
        };

        self.offset = delta.log_count;
        for line in delta.new_logs {
            self.history.push(line.clone());
            self.pending.push_back(ProgressEvent::Log(line));
        }

        if delta.is_done {
            let result = delta.result.unwrap_or_else(|| DeploymentResult {
                success: false,
                message: "Deployment finished without a result".to_string(),
                project_name: None,
                deployed_url: None,
                error: None,
            });
            self.pending.push_back(ProgressEvent::Complete(CompletePayload {
                result,
                logs: self.history.clone(),
            }));
            self.finished = true;
            return;
        }

        if self.last_status.as_deref() != Some(delta.status.as_str()) {
            self.pending.push_back(ProgressEvent::Status(delta.status.clone()));
            self.last_status = Some(delta.status);
        }
    }
}

/// Stream progress events for job `id` until it completes.
///
/// The first poll happens immediately and replays every existing log line; later
/// polls run every `poll_interval`.
pub fn progress_stream(
    reader: JobReader,
    id: String,
    poll_interval: Duration,
) -> impl Stream<Item = ProgressEvent> + Send + 'static {
    let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        reader,
        id,
        offset: 0,
        history: Vec::new(),
        last_status: None,
        pending: VecDeque::new(),
        ticker,
        opened: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            if state.opened {
                state.ticker.tick().await;
            }
            state.opened = true;
            state.poll().await;
        }
    })
}
