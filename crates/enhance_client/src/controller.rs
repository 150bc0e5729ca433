//! Send controller: one streaming session at a time, run on a background task,
//! with UI updates posted over a channel and cooperative cancellation.
//!
//! The worker never calls into the UI. It posts [`UiEvent`]s which the UI loop
//! hands to its [`SessionSink`] via [`dispatch`], [`drain`] or [`pump_session`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Client, ClientError};
use crate::config::Credentials;
use crate::prompt::{self, Instruction};

/// Update posted from the controller to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Fragment(String),
    Error { title: String, message: String },
    SendingChanged(bool),
}

/// Implemented by the UI layer; called on the UI thread only.
pub trait SessionSink {
    fn on_fragment(&mut self, text: &str);
    fn on_error(&mut self, title: &str, message: &str);
    fn on_sending_changed(&mut self, sending: bool);
}

/// Hand one event to the sink.
pub fn dispatch<S: SessionSink + ?Sized>(event: UiEvent, sink: &mut S) {
    match event {
        UiEvent::Fragment(text) => sink.on_fragment(&text),
        UiEvent::Error { title, message } => sink.on_error(&title, &message),
        UiEvent::SendingChanged(sending) => sink.on_sending_changed(sending),
    }
}

/// Dispatch every event already queued, without waiting. Returns how many ran.
pub fn drain<S: SessionSink + ?Sized>(events: &mut UnboundedReceiver<UiEvent>, sink: &mut S) -> usize {
    let mut count = 0;
    loop {
        match events.try_recv() {
            Ok(event) => {
                dispatch(event, sink);
                count += 1;
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return count,
        }
    }
}

/// Dispatch events until the running session reports it is idle again.
pub async fn pump_session<S: SessionSink + ?Sized>(
    events: &mut UnboundedReceiver<UiEvent>,
    sink: &mut S,
) {
    while let Some(event) = events.recv().await {
        let finished = event == UiEvent::SendingChanged(false);
        dispatch(event, sink);
        if finished {
            break;
        }
    }
}

/// Result of a [`SendController::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// A worker was started.
    Started,
    /// A session is already in flight; nothing happened.
    Busy,
    /// Validation failed; an error event was posted.
    NothingToSend,
}

#[derive(Debug)]
struct Session {
    sending: bool,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Shared {
    session: Mutex<Session>,
    output: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Completion {
    Finished,
    Cancelled,
}

/// Drives send → stream → idle for the UI layer.
pub struct SendController {
    client: Client,
    credentials: Credentials,
    runtime: Handle,
    events: UnboundedSender<UiEvent>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SendController {
    /// Create a controller whose workers run on `runtime`. The returned
    /// receiver is the UI thread's end of the event channel.
    pub fn new(
        client: Client,
        credentials: Credentials,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<UiEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            client,
            credentials,
            runtime,
            events,
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    sending: false,
                    cancel: CancellationToken::new(),
                }),
                output: Mutex::new(String::new()),
            }),
            worker: Mutex::new(None),
        };
        (controller, rx)
    }

    pub fn is_sending(&self) -> bool {
        lock(&self.shared.session).sending
    }

    /// Snapshot of the current session's accumulated output.
    pub fn output(&self) -> String {
        lock(&self.shared.output).clone()
    }

    /// Start a session for `instruction` applied to `text`.
    pub fn send(&self, text: &str, instruction: &Instruction) -> SendOutcome {
        let mut session = lock(&self.shared.session);
        if session.sending {
            debug!("send ignored, session in flight");
            return SendOutcome::Busy;
        }

        let prompt = match prompt::compose(instruction, text) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.post(UiEvent::Error {
                    title: e.title().to_string(),
                    message: e.to_string(),
                });
                return SendOutcome::NothingToSend;
            }
        };
        debug!(%prompt, "composed prompt");

        lock(&self.shared.output).clear();
        let cancel = CancellationToken::new();
        session.sending = true;
        session.cancel = cancel.clone();
        self.post(UiEvent::SendingChanged(true));

        let handle = self.runtime.spawn(run_worker(
            self.client.clone(),
            self.credentials.clone(),
            prompt,
            cancel,
            Arc::clone(&self.shared),
            self.events.clone(),
        ));
        *lock(&self.worker) = Some(handle);
        SendOutcome::Started
    }

    /// Ask the running session to stop. Later fragments are dropped and the
    /// connection is closed once the worker notices.
    pub fn stop(&self) {
        let session = lock(&self.shared.session);
        if session.sending {
            debug!("stop requested");
            session.cancel.cancel();
        }
    }

    /// Empty the output buffer. Does nothing while a session is in flight.
    pub fn clear(&self) -> bool {
        let session = lock(&self.shared.session);
        if session.sending {
            return false;
        }
        lock(&self.shared.output).clear();
        true
    }

    /// Wait for the most recently started worker to exit.
    pub async fn wait_idle(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "send worker did not finish cleanly");
            }
        }
    }

    fn post(&self, event: UiEvent) {
        // A closed channel means the UI is gone; nothing left to update.
        let _ = self.events.send(event);
    }
}

async fn run_worker(
    client: Client,
    credentials: Credentials,
    prompt: String,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    events: UnboundedSender<UiEvent>,
) {
    info!(model = %credentials.model, "session started");
    match stream_into(&client, &credentials, &prompt, &cancel, &shared, &events).await {
        Ok(Completion::Finished) => info!("session finished"),
        Ok(Completion::Cancelled) => info!("session cancelled"),
        Err(e) => {
            warn!(error = %e, "session failed");
            let _ = events.send(UiEvent::Error {
                title: e.title().to_string(),
                message: e.to_string(),
            });
        }
    }

    // Flag and event change together so a new session's `true` can never
    // overtake this `false`.
    let mut session = lock(&shared.session);
    session.sending = false;
    session.cancel = CancellationToken::new();
    let _ = events.send(UiEvent::SendingChanged(false));
}

async fn stream_into(
    client: &Client,
    credentials: &Credentials,
    prompt: &str,
    cancel: &CancellationToken,
    shared: &Shared,
    events: &UnboundedSender<UiEvent>,
) -> Result<Completion, ClientError> {
    let mut fragments = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Completion::Cancelled),
        stream = client.stream(prompt, credentials) => stream?,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Completion::Cancelled),
            next = fragments.next() => next,
        };
        let Some(fragment) = next else {
            return Ok(Completion::Finished);
        };
        let fragment = fragment?;
        if cancel.is_cancelled() {
            return Ok(Completion::Cancelled);
        }
        lock(&shared.output).push_str(&fragment);
        let _ = events.send(UiEvent::Fragment(fragment));
    }
}
