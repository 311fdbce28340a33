//! Event loop driving the phase state machine.
//!
//! The controller owns the [`AppState`] and is the only thing that mutates
//! it. Each event goes through [`AppState::apply`]; the returned effects are
//! spawned as tasks on the current runtime and report back through the
//! controller's own channel. Nothing here blocks: a slow path check or save
//! only delays the event it produces.
//!
//! Saves are fire-and-forget from the state machine's point of view, but
//! they pass through a gate that remembers the newest revision written, so
//! an older document never lands on disk after a newer one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};

use crate::phase::{AppState, Effect, Event, Signal};
use crate::reconciler::reconcile;
use crate::storage::{ConfigStore, DirectoryPicker, PathProbe};
use crate::validator::{InputDebouncer, PathValidator};
use crate::{Error, Result};

/// Message on the controller channel.
#[derive(Debug)]
enum Envelope {
    /// Event from a user action or the environment
    External(Event),
    /// An effect finished; `None` when it had nothing to report
    Completed(Option<Event>),
    Shutdown,
}

/// Reports an effect's completion exactly once, even if its task panics.
struct Completion {
    tx: Option<mpsc::UnboundedSender<Envelope>>,
}

impl Completion {
    fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx: Some(tx) }
    }

    fn finish(mut self, event: Option<Event>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Envelope::Completed(event));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::warn!("effect task ended without a result");
            let _ = tx.send(Envelope::Completed(None));
        }
    }
}

/// Cloneable handle for talking to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<AppState>,
}

impl ControllerHandle {
    /// Queue an event.
    pub fn send(&self, event: Event) -> Result<()> {
        self.tx
            .send(Envelope::External(event))
            .map_err(|_| Error::Other("controller has stopped".to_string()))
    }

    /// Push an environment signal.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        self.send(Event::Signal(signal))
    }

    /// Ask [`Controller::run`] to return.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Envelope::Shutdown);
    }

    /// Latest published state.
    pub fn snapshot(&self) -> AppState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified after every processed event.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_rx.clone()
    }
}

/// Runs effects for an [`AppState`] against real capabilities.
pub struct Controller<S, P, K> {
    state: AppState,
    store: Arc<S>,
    validator: PathValidator<P>,
    picker: Arc<K>,
    debouncer: InputDebouncer,
    /// Newest revision written to the store
    save_gate: Arc<Mutex<u64>>,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    state_tx: watch::Sender<AppState>,
    in_flight: usize,
    /// Set once a shutdown request has been seen
    stopping: bool,
}

impl<S, P, K> Controller<S, P, K>
where
    S: ConfigStore,
    P: PathProbe,
    K: DirectoryPicker,
{
    pub fn new(store: S, probe: P, picker: K) -> Self {
        Self::from_parts(Arc::new(store), Arc::new(probe), Arc::new(picker))
    }

    /// Build from shared capabilities (e.g. to inspect them afterwards).
    pub fn from_parts(store: Arc<S>, probe: Arc<P>, picker: Arc<K>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new();
        let (state_tx, _) = watch::channel(state.clone());
        Self {
            state,
            store,
            validator: PathValidator::new(probe),
            picker,
            debouncer: InputDebouncer::default(),
            save_gate: Arc::new(Mutex::new(0)),
            tx,
            rx,
            state_tx,
            in_flight: 0,
            stopping: false,
        }
    }

    /// Set the quiet period for free-text validation.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debouncer = InputDebouncer::new(delay);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn validator(&self) -> &PathValidator<P> {
        &self.validator
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Number of effects still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply an event right away and start its effects.
    pub fn dispatch(&mut self, event: Event) {
        tracing::debug!(?event, "dispatch");
        let effects = self.state.apply(event);
        self.debouncer.mark(self.state.pending_input.generation);
        self.state_tx.send_replace(self.state.clone());
        for effect in effects {
            self.spawn_effect(effect);
        }
    }

    /// Begin bootstrapping and wait until startup has settled.
    pub async fn start(&mut self) {
        self.dispatch(Event::Start);
        self.settle().await;
    }

    /// Process queued events until no effect is in flight.
    pub async fn settle(&mut self) {
        loop {
            let envelope = if self.in_flight == 0 {
                match self.rx.try_recv() {
                    Ok(envelope) => envelope,
                    Err(_) => break,
                }
            } else {
                match self.rx.recv().await {
                    Some(envelope) => envelope,
                    None => break,
                }
            };
            if !self.process(envelope) {
                break;
            }
        }
    }

    /// Process events until [`ControllerHandle::shutdown`], then drain
    /// outstanding effects and return the final state.
    pub async fn run(mut self) -> AppState {
        while !self.stopping {
            match self.rx.recv().await {
                Some(envelope) => {
                    self.process(envelope);
                }
                None => break,
            }
        }
        self.settle().await;
        self.state
    }

    /// Returns false on shutdown.
    fn process(&mut self, envelope: Envelope) -> bool {
        match envelope {
            Envelope::External(event) => self.dispatch(event),
            Envelope::Completed(event) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Some(event) = event {
                    self.dispatch(event);
                }
            }
            Envelope::Shutdown => {
                self.stopping = true;
                return false;
            }
        }
        true
    }

    fn spawn_effect(&mut self, effect: Effect) {
        self.in_flight += 1;
        let done = Completion::new(self.tx.clone());

        match effect {
            Effect::ResolveLocation => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    let event = match store.resolve_location().await {
                        Ok(path) => Event::LocationResolved(path),
                        Err(e) => Event::LocationFailed(e.to_string()),
                    };
                    done.finish(Some(event));
                });
            }
            Effect::LoadDocument => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    let event = match store.load().await {
                        Ok(document) => Event::DocumentLoaded(document),
                        Err(e) => Event::LoadFailed(e.to_string()),
                    };
                    done.finish(Some(event));
                });
            }
            Effect::Reconcile {
                revision,
                epoch,
                origin,
                document,
            } => {
                let validator = self.validator.clone();
                tokio::spawn(async move {
                    let outcome = reconcile(&document, &validator).await;
                    done.finish(Some(Event::Reconciled {
                        revision,
                        epoch,
                        origin,
                        outcome,
                    }));
                });
            }
            Effect::ValidateCandidate { path } => {
                let validator = self.validator.clone();
                tokio::spawn(async move {
                    let check = validator.check(&path).await;
                    done.finish(Some(Event::CandidateChecked(check)));
                });
            }
            Effect::ValidateInput { generation, text } => {
                let validator = self.validator.clone();
                let debouncer = self.debouncer.clone();
                tokio::spawn(async move {
                    let event = debouncer
                        .run(generation, &text, &validator)
                        .await
                        .map(|check| Event::InputValidated { generation, check });
                    done.finish(event);
                });
            }
            Effect::Persist { revision, document } => {
                let store = Arc::clone(&self.store);
                let gate = Arc::clone(&self.save_gate);
                tokio::spawn(async move {
                    let mut written = gate.lock().await;
                    let event = if *written >= revision {
                        tracing::debug!(revision, newest = *written, "skipping superseded save");
                        None
                    } else {
                        match store.save(&document).await {
                            Ok(()) => {
                                *written = revision;
                                tracing::info!(revision, "resources saved");
                                Some(Event::Saved { revision })
                            }
                            Err(e) => Some(Event::SaveFailed {
                                revision,
                                message: e.to_string(),
                            }),
                        }
                    };
                    drop(written);
                    done.finish(event);
                });
            }
            Effect::PickDirectory => {
                let picker = Arc::clone(&self.picker);
                tokio::spawn(async move {
                    let picked = picker.pick_directory().await;
                    done.finish(Some(Event::DirectoryPicked(picked)));
                });
            }
        }
    }
}
