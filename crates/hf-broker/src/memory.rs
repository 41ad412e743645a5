//! In-process broker.
//!
//! Every [`LocalClient`] owns one named delivery thread fed by a bounded
//! queue, so serve/subscribe callbacks run on a broker-owned thread exactly
//! as they would with a networked client. Commands from outside controllers
//! enter through [`InMemoryBroker::actuate`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded, unbounded};
use hf_core::{SignalPath, Value};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{SignalCatalog, SignalKind, SignalMeta};
use crate::client::{BrokerClient, SignalHandle, SignalResolver, ValueCallback};
use crate::error::{BrokerError, BrokerResult};

pub const DELIVERY_QUEUE_CAPACITY: usize = 1024;
const ACTUATE_TIMEOUT: Duration = Duration::from_millis(500);
const STOP_TIMEOUT: Duration = Duration::from_millis(500);
const READY_POLL: Duration = Duration::from_millis(10);

enum Delivery {
    Value {
        callback: ValueCallback,
        handle: SignalHandle,
        value: Value,
    },
    Shutdown,
}

#[derive(Clone)]
struct Route {
    client: u64,
    handle: SignalHandle,
    callback: ValueCallback,
    queue: Sender<Delivery>,
}

impl Route {
    fn deliver(&self, value: Value, timeout: Duration) -> BrokerResult<()> {
        let delivery = Delivery::Value {
            callback: Arc::clone(&self.callback),
            handle: self.handle.clone(),
            value,
        };
        self.queue
            .send_timeout(delivery, timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => BrokerError::Timeout {
                    path: self.handle.path().to_string(),
                    timeout,
                },
                SendTimeoutError::Disconnected(_) => BrokerError::Disconnected,
            })
    }
}

#[derive(Default)]
struct Registry {
    values: HashMap<SignalPath, Value>,
    providers: HashMap<SignalPath, Route>,
    subscribers: HashMap<SignalPath, Vec<Route>>,
    watchers: HashMap<SignalPath, Vec<Sender<Value>>>,
    rejected: HashSet<SignalPath>,
}

struct Shared {
    catalog: SignalCatalog,
    registry: Mutex<Registry>,
    online: AtomicBool,
    next_client: AtomicU64,
}

impl Shared {
    fn meta(&self, path: &SignalPath) -> BrokerResult<SignalMeta> {
        self.catalog
            .get(path)
            .copied()
            .ok_or_else(|| BrokerError::NotFound {
                path: path.to_string(),
            })
    }

    fn handle(&self, path: &SignalPath) -> BrokerResult<SignalHandle> {
        let meta = self.meta(path)?;
        Ok(SignalHandle::new(
            meta.id,
            path.clone(),
            meta.data_type,
            meta.kind,
        ))
    }

    fn require_online(&self) -> BrokerResult<()> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BrokerError::Disconnected)
        }
    }
}

/// Shared broker state. Cloning gives another view of the same broker.
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new(catalog: SignalCatalog) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog,
                registry: Mutex::new(Registry::default()),
                online: AtomicBool::new(true),
                next_client: AtomicU64::new(1),
            }),
        }
    }

    pub fn catalog(&self) -> &SignalCatalog {
        &self.shared.catalog
    }

    /// Open a new client connection. Callbacks are delivered once it is started.
    pub fn connect(&self) -> LocalClient {
        let id = self.shared.next_client.fetch_add(1, Ordering::Relaxed);
        let (queue, inbox) = bounded(DELIVERY_QUEUE_CAPACITY);
        LocalClient {
            id,
            shared: Arc::clone(&self.shared),
            queue,
            inbox,
            worker: Mutex::new(None),
            delivery_thread: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Command an actuator the way an outside controller would.
    pub fn actuate(&self, path: &SignalPath, value: Value) -> BrokerResult<()> {
        self.shared.require_online()?;
        let meta = self.shared.meta(path)?;
        if meta.kind != SignalKind::Actuator {
            return Err(BrokerError::NotAnActuator {
                path: path.to_string(),
            });
        }
        let value = value
            .coerce_to(meta.data_type)
            .map_err(|source| BrokerError::TypeMismatch {
                path: path.to_string(),
                source,
            })?;

        let route = self
            .shared
            .registry
            .lock()
            .providers
            .get(path)
            .cloned()
            .ok_or_else(|| BrokerError::NoProvider {
                path: path.to_string(),
            })?;

        debug!(signal = %path, value = %value, "actuation routed to provider");
        route.deliver(value, ACTUATE_TIMEOUT)
    }

    /// Last published value of a signal.
    pub fn actual(&self, path: &SignalPath) -> Option<Value> {
        self.shared.registry.lock().values.get(path).cloned()
    }

    /// Stream of every value published for `path` from now on.
    pub fn watch(&self, path: &SignalPath) -> Receiver<Value> {
        let (tx, rx) = unbounded();
        self.shared
            .registry
            .lock()
            .watchers
            .entry(path.clone())
            .or_default()
            .push(tx);
        rx
    }

    /// Make every publish to `path` fail with [`BrokerError::Rejected`].
    pub fn reject_publishes(&self, path: &SignalPath, reject: bool) {
        let mut registry = self.shared.registry.lock();
        if reject {
            registry.rejected.insert(path.clone());
        } else {
            registry.rejected.remove(path);
        }
    }

    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::Release);
    }

    pub fn served_signals(&self) -> Vec<SignalPath> {
        let mut served: Vec<SignalPath> = self
            .shared
            .registry
            .lock()
            .providers
            .keys()
            .cloned()
            .collect();
        served.sort();
        served
    }
}

impl SignalResolver for InMemoryBroker {
    fn resolve(&self, path: &SignalPath) -> BrokerResult<SignalHandle> {
        self.shared.handle(path)
    }
}

pub struct LocalClient {
    id: u64,
    shared: Arc<Shared>,
    queue: Sender<Delivery>,
    inbox: Receiver<Delivery>,
    worker: Mutex<Option<JoinHandle<()>>>,
    delivery_thread: Mutex<Option<ThreadId>>,
    started: AtomicBool,
}

impl LocalClient {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn on_delivery_thread(&self) -> bool {
        *self.delivery_thread.lock() == Some(thread::current().id())
    }

    fn unregister(&self) {
        let mut registry = self.shared.registry.lock();
        registry.providers.retain(|_, route| route.client != self.id);
        for routes in registry.subscribers.values_mut() {
            routes.retain(|route| route.client != self.id);
        }
    }
}

fn deliver_loop(inbox: Receiver<Delivery>) {
    for delivery in inbox.iter() {
        match delivery {
            Delivery::Value {
                callback,
                handle,
                value,
            } => callback(&handle, value),
            Delivery::Shutdown => break,
        }
    }
}

impl SignalResolver for LocalClient {
    fn resolve(&self, path: &SignalPath) -> BrokerResult<SignalHandle> {
        self.shared.handle(path)
    }
}

impl BrokerClient for LocalClient {
    fn serve(&self, handle: &SignalHandle, callback: ValueCallback) -> BrokerResult<()> {
        let path = handle.path();
        let meta = self.shared.meta(path)?;
        if meta.kind != SignalKind::Actuator {
            return Err(BrokerError::NotAnActuator {
                path: path.to_string(),
            });
        }

        let mut registry = self.shared.registry.lock();
        if let Some(existing) = registry.providers.get(path) {
            if existing.client != self.id {
                return Err(BrokerError::AlreadyServed {
                    path: path.to_string(),
                });
            }
        }
        registry.providers.insert(
            path.clone(),
            Route {
                client: self.id,
                handle: handle.clone(),
                callback,
                queue: self.queue.clone(),
            },
        );
        debug!(client = self.id, signal = %path, "actuator served");
        Ok(())
    }

    fn subscribe(&self, handle: &SignalHandle, callback: ValueCallback) -> BrokerResult<()> {
        let path = handle.path();
        self.shared.meta(path)?;
        self.shared
            .registry
            .lock()
            .subscribers
            .entry(path.clone())
            .or_default()
            .push(Route {
                client: self.id,
                handle: handle.clone(),
                callback,
                queue: self.queue.clone(),
            });
        debug!(client = self.id, signal = %path, "subscribed");
        Ok(())
    }

    fn start(&self) -> BrokerResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let inbox = self.inbox.clone();
        let name = format!("broker-delivery-{}", self.id);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || deliver_loop(inbox))
            .map_err(|e| BrokerError::Spawn {
                what: format!("{name}: {e}"),
            })?;

        *self.delivery_thread.lock() = Some(spawned.thread().id());
        *worker = Some(spawned);
        self.started.store(true, Ordering::Release);
        info!(client = self.id, "broker client started");
        Ok(())
    }

    fn wait_until_ready(&self, timeout: Duration) -> BrokerResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.started.load(Ordering::Acquire) && self.shared.online.load(Ordering::Acquire)
            {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BrokerError::NotReady { timeout });
            }
            thread::sleep(READY_POLL.min(deadline - now));
        }
    }

    fn publish(&self, handle: &SignalHandle, value: Value, timeout: Duration) -> BrokerResult<()> {
        let path = handle.path();
        if !self.started.load(Ordering::Acquire) {
            return Err(BrokerError::Disconnected);
        }
        self.shared.require_online()?;
        if self.on_delivery_thread() {
            return Err(BrokerError::ReentrantWrite {
                path: path.to_string(),
            });
        }

        let meta = self.shared.meta(path)?;
        let value = value
            .coerce_to(meta.data_type)
            .map_err(|source| BrokerError::TypeMismatch {
                path: path.to_string(),
                source,
            })?;

        let subscribers = {
            let mut registry =
                self.shared
                    .registry
                    .try_lock_for(timeout)
                    .ok_or_else(|| BrokerError::Timeout {
                        path: path.to_string(),
                        timeout,
                    })?;
            if registry.rejected.contains(path) {
                return Err(BrokerError::Rejected {
                    path: path.to_string(),
                    reason: "write refused by broker".to_string(),
                });
            }
            registry.values.insert(path.clone(), value.clone());
            if let Some(watchers) = registry.watchers.get_mut(path) {
                watchers.retain(|tx| tx.send(value.clone()).is_ok());
            }
            registry.subscribers.get(path).cloned().unwrap_or_default()
        };

        for route in subscribers {
            if let Err(e) = route.deliver(value.clone(), timeout) {
                warn!(client = route.client, signal = %path, error = %e, "subscriber notification dropped");
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.unregister();
        self.started.store(false, Ordering::Release);

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if self.queue.send_timeout(Delivery::Shutdown, STOP_TIMEOUT).is_err() {
            warn!(client = self.id, "delivery queue did not accept shutdown");
        }
        if !self.on_delivery_thread() && worker.join().is_err() {
            warn!(client = self.id, "delivery thread panicked");
        }
        *self.delivery_thread.lock() = None;
        info!(client = self.id, "broker client stopped");
    }
}

impl Drop for LocalClient {
    fn drop(&mut self) {
        self.stop();
    }
}
