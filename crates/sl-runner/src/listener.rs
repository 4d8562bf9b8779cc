//! Run status events and their delivery to listeners.
//!
//! Events are pushed onto an unbounded channel and handed to listeners on a
//! dedicated thread, so a slow listener never stalls the scheduler or the
//! workers. At the end of a run the dispatcher is given a bounded time to
//! deliver what is queued; a listener still busy after that is left behind.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sl_types::{CandidateStatus, FailureInfo};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::runner::RunSummary;

/// How long a finished run waits for listeners to drain queued events.
pub const DEFAULT_LISTENER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: Uuid,
        name: String,
    },
    CandidateStatusChanged {
        id: usize,
        status: CandidateStatus,
        score: Option<f64>,
        failure: Option<FailureInfo>,
    },
    RunFinished {
        summary: RunSummary,
    },
}

impl RunEvent {
    pub(crate) fn status(id: usize, status: CandidateStatus) -> Self {
        Self::CandidateStatusChanged {
            id,
            status,
            score: None,
            failure: None,
        }
    }
}

/// Receives run events, in emission order, on the dispatcher thread.
pub trait StatusListener: Send {
    fn on_event(&mut self, event: &RunEvent);
}

/// Records every event. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    events: Arc<Mutex<Vec<RunEvent>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    /// Status transitions recorded for one candidate.
    pub fn statuses_for(&self, id: usize) -> Vec<CandidateStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RunEvent::CandidateStatusChanged {
                    id: event_id,
                    status,
                    ..
                } if *event_id == id => Some(*status),
                _ => None,
            })
            .collect()
    }
}

impl StatusListener for CollectingListener {
    fn on_event(&mut self, event: &RunEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Cheap, cloneable handle for emitting events from any thread.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: Option<Sender<RunEvent>>,
}

impl EventSink {
    pub(crate) fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            if tx.try_send(event).is_err() {
                debug!("event dispatcher has shut down; dropping event");
            }
        }
    }
}

/// Owns the dispatcher thread. Dropping it (or calling [`finish`]) closes the
/// channel and waits up to `drain_timeout` for queued events to be delivered,
/// then detaches the thread.
///
/// [`finish`]: EventDispatcher::finish
pub(crate) struct EventDispatcher {
    sink: EventSink,
    handle: Option<JoinHandle<()>>,
    /// Disconnects when the dispatch loop returns.
    done: Option<Receiver<()>>,
    drain_timeout: Duration,
}

impl EventDispatcher {
    pub(crate) fn start(listeners: Vec<Box<dyn StatusListener>>, drain_timeout: Duration) -> Self {
        let disabled = Self {
            sink: EventSink { tx: None },
            handle: None,
            done: None,
            drain_timeout,
        };
        if listeners.is_empty() {
            return disabled;
        }

        let (tx, rx) = unbounded();
        let (done_tx, done_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("sl-events".to_string())
            .spawn(move || {
                dispatch_loop(rx, listeners);
                drop(done_tx);
            });

        match handle {
            Ok(handle) => Self {
                sink: EventSink { tx: Some(tx) },
                handle: Some(handle),
                done: Some(done_rx),
                drain_timeout,
            },
            Err(e) => {
                warn!(error = %e, "failed to spawn event dispatcher; events disabled");
                disabled
            }
        }
    }

    pub(crate) fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        self.sink.emit(event);
    }

    pub(crate) fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.sink.tx = None;
        let Some(handle) = self.handle.take() else {
            return;
        };
        let drained = match self.done.take() {
            Some(done) => !matches!(
                done.recv_timeout(self.drain_timeout),
                Err(RecvTimeoutError::Timeout)
            ),
            None => true,
        };
        if !drained {
            warn!(
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "status listeners did not drain in time; detaching event dispatcher"
            );
            return;
        }
        if handle.join().is_err() {
            warn!("event dispatcher thread panicked");
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_loop(rx: Receiver<RunEvent>, mut listeners: Vec<Box<dyn StatusListener>>) {
    // Ends once every sender clone has been dropped.
    for event in rx {
        for (i, listener) in listeners.iter_mut().enumerate() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if delivered.is_err() {
                warn!(listener = i, "status listener panicked; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl StatusListener for Exploding {
        fn on_event(&mut self, _event: &RunEvent) {
            panic!("listener bug");
        }
    }

    #[test]
    fn events_arrive_in_order() {
        let collector = CollectingListener::new();
        let dispatcher =
            EventDispatcher::start(vec![Box::new(collector.clone())], DEFAULT_LISTENER_TIMEOUT);
        for status in [
            CandidateStatus::Created,
            CandidateStatus::Queued,
            CandidateStatus::Running,
            CandidateStatus::Complete,
        ] {
            dispatcher.emit(RunEvent::status(0, status));
        }
        dispatcher.finish();

        assert_eq!(
            collector.statuses_for(0),
            vec![
                CandidateStatus::Created,
                CandidateStatus::Queued,
                CandidateStatus::Running,
                CandidateStatus::Complete,
            ]
        );
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let collector = CollectingListener::new();
        let dispatcher =
            EventDispatcher::start(
                vec![Box::new(Exploding), Box::new(collector.clone())],
                DEFAULT_LISTENER_TIMEOUT,
            );
        let sink = dispatcher.sink();
        let worker = thread::spawn(move || {
            sink.emit(RunEvent::status(1, CandidateStatus::Running));
            sink.emit(RunEvent::status(1, CandidateStatus::Failed));
        });
        worker.join().unwrap();
        dispatcher.finish();

        assert_eq!(collector.events().len(), 2);
    }

    struct Stuck(Receiver<()>);

    impl StatusListener for Stuck {
        fn on_event(&mut self, _event: &RunEvent) {
            // blocks until the test drops the sender
            let _ = self.0.recv();
        }
    }

    #[test]
    fn stuck_listener_does_not_block_finish() {
        let (release, gate) = bounded::<()>(0);
        let dispatcher =
            EventDispatcher::start(vec![Box::new(Stuck(gate))], Duration::from_millis(50));
        dispatcher.emit(RunEvent::status(0, CandidateStatus::Created));

        let started = std::time::Instant::now();
        dispatcher.finish();
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release);
    }

    #[test]
    fn no_listeners_means_no_thread() {
        let dispatcher = EventDispatcher::start(Vec::new(), DEFAULT_LISTENER_TIMEOUT);
        assert!(dispatcher.handle.is_none());
        dispatcher.emit(RunEvent::status(0, CandidateStatus::Created));
    }
}
