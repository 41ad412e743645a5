//! Lifecycle controller.
//!
//! `UNCONFIGURED → STARTING → RUNNING → STOPPING → STOPPED`
//!
//! Startup is all-or-nothing: every referenced signal must resolve, every
//! served actuator must register and the client must become ready, or the
//! runner tears down what it built and ends in STOPPED. Once running, faults
//! are recovered per item and never stop the runner.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use hf_broker::{BrokerClient, SignalResolver};
use hf_core::SignalPath;
use hf_dag::{DagEngine, EngineResult, TransformEngine};
use hf_project::{FixtureSet, FixtureSpec, Strategy};
use tracing::{debug, error, info, warn};

use crate::error::{StartupError, StartupResult};
use crate::handles::HandleTable;
use crate::intake::Intake;
use crate::options::RunnerOptions;
use crate::publisher::Publisher;
use crate::scheduler::{GraphWorker, MirrorLane, Worker};
use crate::stats::{RunnerStats, StatsSnapshot};
use crate::work::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "UNCONFIGURED",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Running => "RUNNING",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Builds the transform engine for a graph fixture.
pub type EngineFactory =
    Box<dyn Fn(&FixtureSpec) -> EngineResult<Box<dyn TransformEngine>> + Send>;

/// Cloneable request to leave [`FixtureRunner::run_until`].
#[derive(Clone)]
pub struct StopSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub fn trigger(&self) {
        // A full slot means a stop is already pending.
        let _ = self.tx.try_send(());
    }

    /// Block until triggered or `deadline` passes. True when triggered.
    fn wait_until(&self, deadline: Instant) -> bool {
        !matches!(
            self.rx.recv_deadline(deadline),
            Err(RecvTimeoutError::Timeout)
        )
    }

    fn wait(&self) {
        let _ = self.rx.recv();
    }
}

/// Everything that exists only between a successful start and stop.
struct Active {
    client: Arc<dyn BrokerClient>,
    shutdown: Option<Sender<()>>,
    workers: Vec<Worker>,
    ticks: Vec<(String, Sender<WorkItem>)>,
}

impl Active {
    fn tick(&self) {
        let now = Instant::now();
        for (fixture, queue) in &self.ticks {
            match queue.try_send(WorkItem::Tick(now)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(fixture = %fixture, "work queue full, tick skipped")
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(fixture = %fixture, "graph worker gone, tick not delivered")
                }
            }
        }
    }

    /// Stop ticks, release workers, join them within the bound, then close
    /// the broker connection.
    fn teardown(mut self, options: &RunnerOptions) {
        self.ticks.clear();
        drop(self.shutdown.take());

        let deadline = Instant::now() + options.join_timeout;
        let mut detached = 0usize;
        for worker in self.workers.drain(..) {
            let name = worker.name().to_string();
            if worker.join_until(deadline) {
                debug!(worker = %name, "worker joined");
            } else {
                detached += 1;
            }
        }
        if detached > 0 {
            warn!(detached, "workers still running after shutdown bound");
        }

        self.client.stop();
    }
}

pub struct FixtureRunner {
    options: RunnerOptions,
    state: LifecycleState,
    stats: Arc<RunnerStats>,
    engine_factory: EngineFactory,
    active: Option<Active>,
}

impl FixtureRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            state: LifecycleState::Unconfigured,
            stats: Arc::new(RunnerStats::new()),
            engine_factory: Box::new(|fixture| {
                DagEngine::without_expressions(fixture)
                    .map(|engine| Box::new(engine) as Box<dyn TransformEngine>)
            }),
            active: None,
        }
    }

    /// Replace the engine used for graph fixtures.
    pub fn with_engine_factory(mut self, factory: EngineFactory) -> Self {
        self.engine_factory = factory;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Live counters, readable while `run_until` blocks.
    pub fn stats_handle(&self) -> Arc<RunnerStats> {
        Arc::clone(&self.stats)
    }

    fn transition(&mut self, next: LifecycleState) {
        info!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }

    /// Resolve, register and connect. On error the runner ends in STOPPED
    /// with nothing left registered.
    pub fn start(
        &mut self,
        fixtures: &FixtureSet,
        resolver: &dyn SignalResolver,
        client: Arc<dyn BrokerClient>,
    ) -> StartupResult<()> {
        if self.state != LifecycleState::Unconfigured {
            return Err(StartupError::InvalidState(self.state));
        }
        self.transition(LifecycleState::Starting);

        match self.bring_up(fixtures, resolver, client) {
            Ok(active) => {
                self.active = Some(active);
                self.transition(LifecycleState::Running);
                info!(
                    fixtures = fixtures.len(),
                    served = fixtures.served_count(),
                    "fixture runner started"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "startup failed");
                self.transition(LifecycleState::Stopped);
                Err(e)
            }
        }
    }

    fn bring_up(
        &self,
        fixtures: &FixtureSet,
        resolver: &dyn SignalResolver,
        client: Arc<dyn BrokerClient>,
    ) -> StartupResult<Active> {
        let handles = Arc::new(HandleTable::resolve_all(resolver, fixtures)?);

        // Build engines before anything is registered. Mirror fixtures get none.
        let mut engines = Vec::with_capacity(fixtures.len());
        for fixture in &fixtures.fixtures {
            let engine = match fixture.strategy() {
                Strategy::Mirror => None,
                Strategy::Graph => Some((self.engine_factory)(fixture).map_err(|source| {
                    StartupError::Engine {
                        fixture: fixture.name.clone(),
                        source,
                    }
                })?),
            };
            engines.push(engine);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let mut active = Active {
            client: Arc::clone(&client),
            shutdown: Some(shutdown_tx),
            workers: Vec::new(),
            ticks: Vec::new(),
        };

        match self.wire(&mut active, fixtures, &handles, engines, shutdown_rx) {
            Ok(()) => Ok(active),
            Err(e) => {
                active.teardown(&self.options);
                Err(e)
            }
        }
    }

    fn wire(
        &self,
        active: &mut Active,
        fixtures: &FixtureSet,
        handles: &Arc<HandleTable>,
        engines: Vec<Option<Box<dyn TransformEngine>>>,
        shutdown: Receiver<()>,
    ) -> StartupResult<()> {
        let client = Arc::clone(&active.client);
        let publisher = Publisher::new(
            Arc::clone(&client),
            Arc::clone(handles),
            self.options.publish_timeout,
            Arc::clone(&self.stats),
        );

        let mut actuators: HashMap<SignalPath, Sender<WorkItem>> = HashMap::new();
        let mut observers: HashMap<SignalPath, Vec<Sender<WorkItem>>> = HashMap::new();

        for (fixture, engine) in fixtures.fixtures.iter().zip(engines) {
            match engine {
                None => {
                    for actuator in &fixture.served {
                        let (tx, rx) = bounded(self.options.queue_capacity);
                        let lane = MirrorLane::new(
                            fixture,
                            actuator,
                            rx,
                            shutdown.clone(),
                            publisher.clone(),
                        );
                        active
                            .workers
                            .push(Worker::spawn(format!("mirror:{actuator}"), move || {
                                lane.run()
                            })?);
                        actuators.insert(actuator.clone(), tx);
                    }
                }
                Some(engine) => {
                    let (tx, rx) = bounded(self.options.queue_capacity);
                    let worker = GraphWorker::new(
                        fixture,
                        engine,
                        rx,
                        shutdown.clone(),
                        publisher.clone(),
                    );
                    active
                        .workers
                        .push(Worker::spawn(format!("graph:{}", fixture.name), move || {
                            worker.run()
                        })?);
                    for actuator in &fixture.served {
                        actuators.insert(actuator.clone(), tx.clone());
                    }
                    for dep in fixture.external_dependencies() {
                        observers.entry(dep).or_default().push(tx.clone());
                    }
                    active.ticks.push((fixture.name.clone(), tx));
                }
            }
        }

        let observed: Vec<SignalPath> = observers.keys().cloned().collect();
        let intake = Arc::new(Intake::new(actuators, observers, Arc::clone(&self.stats)));

        for fixture in &fixtures.fixtures {
            for actuator in &fixture.served {
                register(handles, actuator, |handle| {
                    client.serve(handle, intake.actuation_callback())
                })?;
                info!(fixture = %fixture.name, actuator = %actuator, "serving actuator");
            }
        }
        for signal in &observed {
            register(handles, signal, |handle| {
                client.subscribe(handle, intake.observation_callback())
            })?;
            info!(signal = %signal, "observing dependency");
        }

        client.start().map_err(StartupError::Connection)?;
        client
            .wait_until_ready(self.options.ready_timeout)
            .map_err(StartupError::Connection)?;
        Ok(())
    }

    /// Block in RUNNING until `stop` is triggered, then stop.
    ///
    /// Graph fixtures receive a tick every `tick_interval`; mirror-only runs
    /// just wait.
    pub fn run_until(&mut self, stop: &StopSignal) {
        let Some(active) = self.active.as_ref() else {
            warn!(state = %self.state, "run requested while not running");
            return;
        };

        if active.ticks.is_empty() {
            stop.wait();
        } else {
            let interval = self.options.tick_interval;
            let mut next = Instant::now() + interval;
            while !stop.wait_until(next) {
                active.tick();
                next += interval;
                let now = Instant::now();
                if next < now {
                    // Fell behind; skip missed ticks.
                    next = now + interval;
                }
            }
        }
        self.stop();
    }

    /// Stop ticks, release and join workers, close the broker connection.
    pub fn stop(&mut self) {
        if !matches!(
            self.state,
            LifecycleState::Starting | LifecycleState::Running
        ) {
            return;
        }
        self.transition(LifecycleState::Stopping);
        if let Some(active) = self.active.take() {
            active.teardown(&self.options);
        }
        self.transition(LifecycleState::Stopped);
        info!(stats = %self.stats.snapshot(), "fixture runner stopped");
    }
}

impl Drop for FixtureRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn register<F>(handles: &HandleTable, signal: &SignalPath, op: F) -> StartupResult<()>
where
    F: FnOnce(&hf_broker::SignalHandle) -> hf_broker::BrokerResult<()>,
{
    let Some(handle) = handles.get(signal) else {
        return Err(StartupError::Registration {
            signal: signal.to_string(),
            source: hf_broker::BrokerError::NotFound {
                path: signal.to_string(),
            },
        });
    };
    op(handle).map_err(|source| StartupError::Registration {
        signal: signal.to_string(),
        source,
    })
}
