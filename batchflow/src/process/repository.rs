//! Registry of business processes, task handlers and observers.

use super::{BaseProcess, JsonSerializer, MasterSlaveObserver, ProcessTask, Serializer};
use crate::pipeline::safe_invoke;
use crate::task::{TaskContext, TaskListener};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Lookup surface the engine needs from the registry.
pub trait ProcessRegistry: Send + Sync {
    /// Returns the business process for a key.
    fn process(&self, process_key: i32) -> Option<Arc<dyn BaseProcess>>;

    /// Returns every registered process, in registration order.
    fn registered_processes(&self) -> Vec<Arc<dyn BaseProcess>>;

    /// Returns the task handler for a key.
    fn task_handler(&self, process_key: i32) -> Option<Arc<dyn ProcessTask>>;

    /// Returns the serializer for a task handler's payloads.
    fn serializer_for(&self, task: &dyn ProcessTask) -> Arc<dyn Serializer>;
}

/// Explicitly populated process registry.
///
/// Registrations replace the reflection scan of a plugin host: callers
/// register processes, task handlers, observers and listeners at startup.
pub struct ProcessRepository {
    processes: RwLock<Vec<Arc<dyn BaseProcess>>>,
    tasks: DashMap<i32, Arc<dyn ProcessTask>>,
    serializers: DashMap<i32, Arc<dyn Serializer>>,
    default_serializer: Arc<dyn Serializer>,
    observers: RwLock<Vec<Arc<dyn MasterSlaveObserver>>>,
    listeners: RwLock<Vec<Arc<dyn TaskListener>>>,
}

impl Default for ProcessRepository {
    fn default() -> Self {
        Self {
            processes: RwLock::new(Vec::new()),
            tasks: DashMap::new(),
            serializers: DashMap::new(),
            default_serializer: Arc::new(JsonSerializer),
            observers: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl ProcessRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the serializer used for tasks without their own.
    #[must_use]
    pub fn with_default_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.default_serializer = serializer;
        self
    }

    /// Registers a business process, replacing one with the same key.
    pub fn register_process(&self, process: Arc<dyn BaseProcess>) {
        let key = process.process_key();
        let mut processes = self.processes.write();
        processes.retain(|p| p.process_key() != key);
        debug!(process_key = key, name = process.name(), "Process registered");
        processes.push(process);
    }

    /// Registers a task handler; the first handler for a key wins.
    ///
    /// Returns false if a handler was already registered for the key.
    pub fn register_task(&self, task: Arc<dyn ProcessTask>) -> bool {
        let key = task.process_key();
        match self.tasks.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                debug!(process_key = key, name = task.name(), "Task handler registered");
                entry.insert(task);
                true
            }
        }
    }

    /// Registers a master/slave observer.
    pub fn register_observer(&self, observer: Arc<dyn MasterSlaveObserver>) {
        self.observers.write().push(observer);
    }

    /// Registers a task listener.
    pub fn register_listener(&self, listener: Arc<dyn TaskListener>) {
        self.listeners.write().push(listener);
    }

    /// Notifies every observer that this node became master.
    ///
    /// Returns how many observers succeeded; failures are logged.
    pub fn invoke_on_master(&self) -> usize {
        let observers = self.observers.read().clone();
        observers
            .iter()
            .filter(|observer| safe_invoke("on_master", || observer.on_master()))
            .count()
    }

    /// Notifies every observer that this node became slave.
    pub fn invoke_on_slave(&self) -> usize {
        let observers = self.observers.read().clone();
        observers
            .iter()
            .filter(|observer| safe_invoke("on_slave", || observer.on_slave()))
            .count()
    }

    /// Runs every listener's `before_execute` hook.
    pub fn invoke_before_execute(&self, ctx: &dyn TaskContext) -> usize {
        let listeners = self.listeners.read().clone();
        listeners
            .iter()
            .filter(|listener| {
                trace!(listener = listener.name(), task_id = ctx.task_id(), "Invoking listener");
                safe_invoke(listener.name(), || listener.before_execute(ctx))
            })
            .count()
    }

    /// Runs every listener's `after_execute` hook.
    pub fn invoke_after_execute(&self, ctx: &dyn TaskContext) -> usize {
        let listeners = self.listeners.read().clone();
        listeners
            .iter()
            .filter(|listener| {
                trace!(listener = listener.name(), task_id = ctx.task_id(), "Invoking listener");
                safe_invoke(listener.name(), || listener.after_execute(ctx))
            })
            .count()
    }
}

impl ProcessRegistry for ProcessRepository {
    fn process(&self, process_key: i32) -> Option<Arc<dyn BaseProcess>> {
        self.processes
            .read()
            .iter()
            .find(|p| p.process_key() == process_key)
            .cloned()
    }

    fn registered_processes(&self) -> Vec<Arc<dyn BaseProcess>> {
        self.processes.read().clone()
    }

    fn task_handler(&self, process_key: i32) -> Option<Arc<dyn ProcessTask>> {
        self.tasks.get(&process_key).map(|entry| Arc::clone(entry.value()))
    }

    fn serializer_for(&self, task: &dyn ProcessTask) -> Arc<dyn Serializer> {
        self.serializers
            .entry(task.process_key())
            .or_insert_with(|| {
                task.serializer()
                    .unwrap_or_else(|| Arc::clone(&self.default_serializer))
            })
            .clone()
    }
}

impl fmt::Debug for ProcessRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRepository")
            .field("processes", &self.processes.read().len())
            .field("tasks", &self.tasks.len())
            .field("observers", &self.observers.read().len())
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}
