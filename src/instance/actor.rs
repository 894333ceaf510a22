// Instance actor - the single-threaded cooperative state machine (§4.E, §5)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::{Command, Response};
use super::state::InstanceState;
use crate::config::InstanceConfig;
use crate::event::{Event, JournalEntry};
use crate::executor::{self, FiringResult};
use crate::journal::Journal;
use crate::marking::{ColoredMarking, MarkingLike};
use crate::net::{Net, StrategyDecision, TransitionId};
use crate::token_game::{consumable_parameters, enabled_transitions};
use crate::Result;

/// Messages the actor's single mailbox serializes, per §5: "commands,
/// events, and scheduler decisions are serialized through one mailbox."
enum Internal {
    Cmd(Command, oneshot::Sender<Response>),
    Completed {
        result: FiringResult,
        reply: Option<oneshot::Sender<Response>>,
    },
    RetryDue(TransitionId),
    Shutdown,
}

/// Buffered events a lagging subscriber can fall behind by before it starts
/// missing them (it gets a `Lagged` error from `BroadcastStream`, not a
/// silent gap).
const EVENT_BUFFER: usize = 256;

/// Handle to a running instance. Cloning shares the same mailbox; dropping
/// every clone lets the actor task exit once its mailbox is closed.
#[derive(Clone)]
pub struct Instance {
    tx: mpsc::UnboundedSender<Internal>,
    events: broadcast::Sender<Event>,
}

impl Instance {
    /// Start (or resume) an instance backed by `journal` under
    /// `instance_id`. Replays existing journal entries per the recovery
    /// protocol (§4.G) before accepting new commands.
    pub async fn spawn(
        net: Arc<Net>,
        journal: Arc<dyn Journal>,
        instance_id: impl Into<String>,
        config: InstanceConfig,
    ) -> Result<(Instance, JoinHandle<()>)> {
        let instance_id = instance_id.into();
        let replayed = journal.replay(&instance_id).await?;
        let state = InstanceState::replay(replayed.iter().map(|entry| &entry.event));
        info!(instance_id = %instance_id, sequence_no = state.sequence_no, "instance recovered");

        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let worker_pool = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        let actor = Actor {
            net,
            journal,
            instance_id,
            config,
            state,
            in_flight: HashSet::new(),
            retry_handles: HashMap::new(),
            tx: tx.clone(),
            events: events_tx.clone(),
            shutdown: CancellationToken::new(),
            worker_pool,
        };
        let join = tokio::spawn(actor.run(rx));
        let instance = Instance { tx, events: events_tx };
        // §4.G: "upon end of replay, transition to Running and invoke the
        // scheduler once" — the actor does this as its first action in `run`.
        Ok((instance, join))
    }

    /// Subscribe to every event journaled from this point on. Events
    /// journaled before the subscription, or while the subscriber is
    /// disconnected, are not replayed here — use [`Journal::replay`] for
    /// the durable history.
    pub fn subscribe(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub async fn initialize(&self, marking: ColoredMarking, initial_state: serde_json::Value) -> Result<Response> {
        self.call(Command::Initialize { marking, initial_state }).await
    }

    pub async fn fire(&self, transition_id: TransitionId, payload: Option<serde_json::Value>) -> Result<Response> {
        self.call(Command::FireTransition { transition_id, payload }).await
    }

    pub async fn get_state(&self) -> Result<Response> {
        self.call(Command::GetState).await
    }

    /// Abandon all in-flight firings and pending retry timers and stop the
    /// actor. Per §4.F: "their events will not be journaled."
    pub fn shutdown(&self) {
        let _ = self.tx.send(Internal::Shutdown);
    }

    async fn call(&self, cmd: Command) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Internal::Cmd(cmd, reply_tx))
            .map_err(|_| crate::error::EngineError::Internal("instance actor has stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| crate::error::EngineError::Internal("instance actor dropped the reply".into()))
    }
}

struct Actor {
    net: Arc<Net>,
    journal: Arc<dyn Journal>,
    instance_id: String,
    config: InstanceConfig,
    state: InstanceState,
    /// At most one in-flight firing per transition (§4.E invariant).
    in_flight: HashSet<TransitionId>,
    /// Pending retry timers, cancellable on shutdown (§4.F).
    retry_handles: HashMap<TransitionId, AbortHandle>,
    tx: mpsc::UnboundedSender<Internal>,
    events: broadcast::Sender<Event>,
    /// Cancelled by [`Actor::append`] on a journal failure, per §7: a
    /// journal failure is fatal to the instance, not just the one command.
    shutdown: CancellationToken,
    /// Bounds how many firings actually run their user function
    /// concurrently, per `InstanceConfig::worker_pool_size`. The
    /// one-in-flight-per-transition invariant is separate and unconditional;
    /// this only caps total concurrency across distinct transitions.
    worker_pool: Arc<Semaphore>,
}

impl Actor {
    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Internal>) {
        self.run_scheduler();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = mailbox.recv() => {
                    let Some(msg) = msg else { break };
                    match msg {
                        Internal::Cmd(cmd, reply) => self.handle_command(cmd, reply).await,
                        Internal::Completed { result, reply } => self.handle_completion(result, reply).await,
                        Internal::RetryDue(transition_id) => self.handle_retry_due(transition_id).await,
                        Internal::Shutdown => break,
                    }
                }
            }
        }
        for (_, handle) in self.retry_handles.drain() {
            handle.abort();
        }
        debug!(instance_id = %self.instance_id, "instance actor stopped");
    }

    async fn handle_command(&mut self, cmd: Command, reply: oneshot::Sender<Response>) {
        match cmd {
            Command::Initialize { marking, initial_state } => {
                if self.state.initialized {
                    let _ = reply.send(Response::AlreadyInitialized);
                    return;
                }
                let event = Event::Initialized {
                    marking: marking.clone(),
                    initial_state: initial_state.clone(),
                };
                if !self.append(vec![event.clone()]).await {
                    return;
                }
                self.state = self.state.apply(&event);
                let _ = reply.send(Response::Initialized { marking, initial_state });
                self.run_scheduler();
            }
            Command::FireTransition { transition_id, payload } => {
                if let Some(record) = self.state.failures.get(&transition_id) {
                    if record.is_terminal() {
                        let _ = reply.send(Response::TransitionNotEnabled {
                            transition_id,
                            reason: "has failed previously".to_string(),
                        });
                        return;
                    }
                }
                if !enabled_transitions(&self.net, &self.state.marking).contains(&transition_id) {
                    let _ = reply.send(Response::TransitionNotEnabled {
                        transition_id,
                        reason: "not enough tokens".to_string(),
                    });
                    return;
                }
                let Some(consume) = consumable_parameters(&self.net, &self.state.marking, transition_id) else {
                    let _ = reply.send(Response::TransitionNotEnabled {
                        transition_id,
                        reason: "not enough tokens".to_string(),
                    });
                    return;
                };
                self.launch_firing(transition_id, consume, payload, Some(reply));
            }
            Command::GetState => {
                let _ = reply.send(Response::ProcessState {
                    sequence_no: self.state.sequence_no,
                    marking: self.state.marking.clone(),
                    consumed_jobs: self.state.consumed_jobs.clone(),
                });
            }
        }
    }

    fn launch_firing(
        &mut self,
        transition_id: TransitionId,
        consume: ColoredMarking,
        payload: Option<serde_json::Value>,
        reply: Option<oneshot::Sender<Response>>,
    ) {
        self.in_flight.insert(transition_id);
        let net = Arc::clone(&self.net);
        let tx = self.tx.clone();
        let worker_pool = Arc::clone(&self.worker_pool);
        tokio::spawn(async move {
            let _permit = worker_pool.acquire_owned().await.expect("worker pool semaphore is never closed");
            let result = executor::fire(&net, transition_id, consume, payload).await;
            let _ = tx.send(Internal::Completed { result, reply });
        });
    }

    async fn handle_completion(&mut self, result: FiringResult, reply: Option<oneshot::Sender<Response>>) {
        match result {
            FiringResult::Fired(outcome) => {
                self.in_flight.remove(&outcome.transition_id);
                let new_sequence_no = self.state.sequence_no + 1;
                let event = Event::TransitionFired {
                    transition_id: outcome.transition_id,
                    job_id: outcome.job_id,
                    consume: outcome.consume.clone(),
                    produce: outcome.produce.clone(),
                    event_payload: outcome.event.clone(),
                    new_sequence_no,
                };
                if !self.append(vec![event.clone()]).await {
                    return;
                }
                self.state = self.state.apply(&event);
                if let Some(reply) = reply {
                    let _ = reply.send(Response::TransitionFired {
                        transition_id: outcome.transition_id,
                        job_id: outcome.job_id,
                        consume: outcome.consume,
                        produce: outcome.produce,
                        event_payload: outcome.event,
                        new_sequence_no,
                    });
                }
                self.run_scheduler();
            }
            FiringResult::Failed(failure) => {
                self.in_flight.remove(&failure.transition_id);
                let attempt = self
                    .state
                    .failures
                    .get(&failure.transition_id)
                    .map(|r| r.attempt_count + 1)
                    .unwrap_or(1);
                let decision = self.decide(failure.transition_id, &failure.error_message, attempt);
                let event = Event::TransitionFailed {
                    transition_id: failure.transition_id,
                    job_id: failure.job_id,
                    consume: failure.consume,
                    error_message: failure.error_message.clone(),
                    strategy_decision: decision,
                    attempt,
                };
                if !self.append(vec![event.clone()]).await {
                    return;
                }
                self.state = self.state.apply(&event);
                if matches!(decision, StrategyDecision::Fatal) {
                    warn!(transition_id = %failure.transition_id, "transition permanently disabled");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(Response::TransitionFailed {
                        transition_id: failure.transition_id,
                        job_id: failure.job_id,
                        error_message: failure.error_message,
                        strategy_decision: decision,
                        attempt,
                    });
                }
                if let StrategyDecision::RetryWithDelay(millis) = decision {
                    self.schedule_retry(failure.transition_id, millis);
                }
                self.run_scheduler();
            }
        }
    }

    /// Apply the transition's exception strategy, optionally coerced to
    /// `Fatal` by the configured retry ceiling (§7: "Retry backoff is
    /// whatever the user strategy returns; the engine does not impose its
    /// own" — the ceiling is an opt-in override, not a default).
    fn decide(&self, transition_id: TransitionId, error_message: &str, attempt: u32) -> StrategyDecision {
        let Some(transition) = self.net.transition(transition_id) else {
            return StrategyDecision::Fatal;
        };
        let decision = (transition.strategy)(error_message, attempt);
        match (decision, self.config.default_retry_ceiling) {
            (StrategyDecision::RetryWithDelay(_), Some(ceiling)) if attempt >= ceiling => StrategyDecision::Fatal,
            (other, _) => other,
        }
    }

    fn schedule_retry(&mut self, transition_id: TransitionId, millis: u64) {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
            let _ = tx.send(Internal::RetryDue(transition_id));
        });
        self.retry_handles.insert(transition_id, handle.abort_handle());
    }

    async fn handle_retry_due(&mut self, transition_id: TransitionId) {
        self.retry_handles.remove(&transition_id);
        if self.in_flight.contains(&transition_id) {
            return;
        }
        if let Some(record) = self.state.failures.get(&transition_id) {
            if record.is_terminal() {
                return;
            }
        }
        if !enabled_transitions(&self.net, &self.state.marking).contains(&transition_id) {
            // Per §4.F: "pending timers for transitions that are no longer
            // enabled are discarded."
            debug!(transition_id = %transition_id, "retry timer fired but transition no longer enabled, discarding");
            return;
        }
        if let Some(consume) = consumable_parameters(&self.net, &self.state.marking, transition_id) {
            self.launch_firing(transition_id, consume, None, None);
        }
    }

    /// After every applied event, launch every automatic, enabled,
    /// non-blocked, not-already-in-flight transition (§4.F).
    fn run_scheduler(&mut self) {
        let enabled = enabled_transitions(&self.net, &self.state.marking);
        let candidates: Vec<TransitionId> = self
            .net
            .transitions()
            .filter(|t| t.automated)
            .map(|t| t.id)
            .filter(|tid| enabled.contains(tid))
            .filter(|tid| !self.in_flight.contains(tid))
            .filter(|tid| {
                !self
                    .state
                    .failures
                    .get(tid)
                    .map(|r| r.is_terminal() || matches!(r.strategy_decision, StrategyDecision::RetryWithDelay(_)))
                    .unwrap_or(false)
            })
            .collect();

        for tid in candidates {
            if let Some(consume) = consumable_parameters(&self.net, &self.state.marking, tid) {
                debug!(transition_id = %tid, "scheduler launching automatic transition");
                self.launch_firing(tid, consume, None, None);
            }
        }
    }

    /// Journal `events`, returning `false` (and stopping the instance per
    /// §7's JournalFailure policy) if the append itself fails.
    async fn append(&self, events: Vec<Event>) -> bool {
        let entries: Vec<JournalEntry> = events
            .into_iter()
            .map(|event| JournalEntry {
                instance_id: self.instance_id.clone(),
                sequence_no: self.state.sequence_no,
                event,
                recorded_at: chrono::Utc::now(),
            })
            .collect();
        match self.journal.append(&self.instance_id, entries.clone()).await {
            Ok(()) => {
                for entry in entries {
                    // No subscribers is the common case outside tests/demos; a
                    // broadcast send only fails when there are none.
                    let _ = self.events.send(entry.event);
                }
                true
            }
            Err(err) => {
                error!(instance_id = %self.instance_id, error = %err, "journal append failed, stopping instance");
                self.shutdown.cancel();
                false
            }
        }
    }
}
