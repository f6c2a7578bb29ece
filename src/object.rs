use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::arena::ObjectDb;
use crate::callable::Callable;
use crate::class::{ClassInfo, Notification, ObjectKind};
use crate::dispatch::EmissionState;
use crate::error::{CallError, SignalError};
use crate::id::ObjectId;
use crate::ledger::ConnectionLedger;
use crate::queue::{CallQueue, MessageQueue};
use crate::signal::{
    ConnectFlags, ConnectOutcome, Connection, DisconnectOutcome, Signal, SignalInfo, SignalTable,
};
use crate::variant::Variant;

/// A registered object: an id, a kind, and its signals.
///
/// Objects always live in an `Arc`. The object database only keeps a weak
/// reference, so the object is destroyed when the last `Arc` is dropped;
/// destruction tears down every connection in both directions and releases
/// the id.
///
/// # Usage
/// ```ignore
/// let button = Object::new(BaseObject);
/// button.add_user_signal(SignalInfo::new("pressed"))?;
///
/// let handler = Callable::from_fn("on_pressed", |_| {
///     println!("pressed!");
///     Ok(Variant::Nil)
/// });
/// button.connect("pressed", handler, ConnectFlags::empty())?;
///
/// let report = button.emit_signal("pressed", &[])?;
/// assert_eq!(report.delivered(), 1);
/// ```
pub struct Object {
    id: ObjectId,
    kind: Box<dyn ObjectKind>,
    class: &'static ClassInfo,
    pub(crate) signals: Mutex<SignalTable>,
    ledger: Mutex<ConnectionLedger>,
    block_signals: AtomicBool,
    auto_declare: bool,
    pub(crate) call_queue: Arc<dyn CallQueue>,
    pub(crate) emission: EmissionState,
}

/// Configures an [`Object`] before it is registered.
///
/// # Example
///
/// ```ignore
/// let queue = Arc::new(MessageQueue::new());
/// let object = Object::builder(ScriptedKind::default())
///     .call_queue(queue.clone())
///     .auto_declare_signals(true)
///     .build();
/// ```
pub struct ObjectBuilder {
    kind: Box<dyn ObjectKind>,
    call_queue: Option<Arc<dyn CallQueue>>,
    auto_declare: Option<bool>,
}

impl ObjectBuilder {
    /// Route deferred calls of this object through `queue`.
    ///
    /// Default: [`MessageQueue::global()`]
    pub fn call_queue(mut self, queue: Arc<dyn CallQueue>) -> Self {
        self.call_queue = Some(queue);
        self
    }

    /// Declare unknown signals on first connect instead of rejecting them.
    ///
    /// Default: [`ObjectKind::declares_signals_on_connect`]
    pub fn auto_declare_signals(mut self, enabled: bool) -> Self {
        self.auto_declare = Some(enabled);
        self
    }

    /// Register the object and deliver [`Notification::PostInitialize`].
    pub fn build(self) -> Arc<Object> {
        let class = self.kind.class();
        let auto_declare = self
            .auto_declare
            .unwrap_or_else(|| self.kind.declares_signals_on_connect());
        let call_queue = self.call_queue.unwrap_or_else(|| {
            let global: Arc<dyn CallQueue> = MessageQueue::global().clone();
            global
        });
        let kind = self.kind;

        let object = Arc::new_cyclic(|weak| Object {
            id: ObjectDb::register(weak.clone(), class.ref_counted),
            kind,
            class,
            signals: Mutex::new(SignalTable::default()),
            ledger: Mutex::new(ConnectionLedger::default()),
            block_signals: AtomicBool::new(false),
            auto_declare,
            call_queue,
            emission: EmissionState::default(),
        });

        tracing::debug!(object = %object.id, class = class.name, "created object");
        object.notification(Notification::PostInitialize);
        object
    }
}

impl Object {
    /// Build and register an object with default settings.
    pub fn new(kind: impl ObjectKind) -> Arc<Object> {
        Self::builder(kind).build()
    }

    /// Start configuring an object.
    pub fn builder(kind: impl ObjectKind) -> ObjectBuilder {
        ObjectBuilder {
            kind: Box::new(kind),
            call_queue: None,
            auto_declare: None,
        }
    }

    /// The id naming this object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Class descriptor.
    pub fn class(&self) -> &'static ClassInfo {
        self.class
    }

    /// Class name.
    pub fn class_name(&self) -> &'static str {
        self.class.name
    }

    /// Whether the object's class is `name` or inherits from it.
    pub fn is_class(&self, name: &str) -> bool {
        self.class.is_class(name)
    }

    /// Whether the object belongs to the reference-counted category.
    pub fn is_ref_counted(&self) -> bool {
        self.id.is_ref_counted()
    }

    /// The kind implementing this object's behavior.
    pub fn kind(&self) -> &dyn ObjectKind {
        self.kind.as_ref()
    }

    /// A [`Signal`] value for `name` on this object.
    pub fn signal(&self, name: &str) -> Signal {
        Signal::new(self.id, name)
    }

    /// Call `method` through the object's kind.
    pub fn call(&self, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
        self.kind.call(self, method, args)
    }

    /// Queue a call of `method` on this object's call queue.
    pub fn call_deferred(&self, method: &str, args: Vec<Variant>) {
        self.call_queue.push_call(self.id, method, args);
    }

    /// Deliver a notification to the object's kind.
    pub fn notification(&self, what: Notification) {
        self.kind.notification(self, what);
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Declare a signal on this instance.
    pub fn add_user_signal(&self, info: SignalInfo) -> Result<(), SignalError> {
        if info.name.is_empty() {
            return Err(SignalError::EmptyName);
        }
        if let Some((declarer, _)) = self.class.find_signal(&info.name) {
            return Err(SignalError::BuiltinConflict {
                signal: info.name,
                class: declarer.name,
            });
        }

        let name = info.name.clone();
        self.signals.lock().declare(info)?;
        tracing::debug!(object = %self.id, signal = %name, "declared user signal");
        Ok(())
    }

    /// Remove a user signal and every connection to it.
    pub fn remove_user_signal(&self, name: &str) -> Result<(), SignalError> {
        let removed = {
            let mut table = self.signals.lock();
            if !table.has_user_signal(name) {
                return Err(match self.class.find_signal(name) {
                    Some((declarer, _)) => SignalError::NotRemovable {
                        signal: name.to_owned(),
                        class: declarer.name,
                    },
                    None => self.unknown_signal(name),
                });
            }
            table.remove(name)
        };

        if let Some(data) = removed {
            for slot in data.slots.into_values() {
                forget_in_target(&slot.conn);
            }
        }
        tracing::debug!(object = %self.id, signal = name, "removed user signal");
        Ok(())
    }

    /// Whether the class chain or the instance declares `name`.
    pub fn has_signal(&self, name: &str) -> bool {
        self.class.has_signal(name) || self.signals.lock().has_user_signal(name)
    }

    /// Whether `name` is a user signal of this instance.
    pub fn has_user_signal(&self, name: &str) -> bool {
        self.signals.lock().has_user_signal(name)
    }

    /// Every signal of the object: built-in ones (most derived class
    /// first), then user signals in declaration order.
    pub fn signal_list(&self) -> Vec<SignalInfo> {
        let mut list: Vec<SignalInfo> = self.class.signal_list().map(|s| s.to_info()).collect();
        list.extend(self.signals.lock().user_signals().cloned());
        list
    }

    pub(crate) fn unknown_signal(&self, name: &str) -> SignalError {
        SignalError::UnknownSignal {
            object: self.id,
            class: self.class.name,
            signal: name.to_owned(),
        }
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Connect `callable` to the signal `name`.
    ///
    /// Connecting a callable that is already connected fails unless `flags`
    /// contains [`ConnectFlags::REFERENCE_COUNTED`], in which case the
    /// existing connection's reference count is incremented.
    pub fn connect(
        &self,
        name: &str,
        callable: Callable,
        mut flags: ConnectFlags,
    ) -> Result<(), SignalError> {
        self.emission.check_thread("connect", self.id);

        if !callable.is_valid() || !callable.target_alive() {
            return Err(SignalError::InvalidCallable {
                signal: name.to_owned(),
            });
        }

        let conn = {
            let mut table = self.signals.lock();
            if !table.has_user_signal(name) {
                match self.class.find_signal(name) {
                    Some((declarer, _)) => {
                        if !std::ptr::eq(declarer, self.class) {
                            flags |= ConnectFlags::INHERITED;
                        }
                    }
                    None if self.auto_declare => {
                        cov_mark::hit!(undeclared_signal_declared_on_connect);
                        table.declare(SignalInfo::new(name))?;
                    }
                    None => return Err(self.unknown_signal(name)),
                }
            }

            let conn = Connection {
                signal: self.signal(name),
                callable,
                flags,
            };
            match table.connect(conn.clone())? {
                ConnectOutcome::Inserted => conn,
                ConnectOutcome::Referenced(count) => {
                    tracing::trace!(
                        object = %self.id,
                        signal = name,
                        callable = %conn.callable,
                        count,
                        "connection reference added"
                    );
                    return Ok(());
                }
            }
        };

        if let Some(target) = conn.callable.target().and_then(ObjectDb::resolve) {
            target.ledger.lock().record(conn.clone());
        }
        tracing::debug!(
            object = %self.id,
            signal = name,
            callable = %conn.callable,
            flags = ?conn.flags,
            "connected"
        );
        Ok(())
    }

    /// Disconnect `callable` from the signal `name`.
    ///
    /// A reference-counted connection stays in place until it has been
    /// disconnected as many times as it was connected.
    pub fn disconnect(&self, name: &str, callable: &Callable) -> Result<(), SignalError> {
        self.emission.check_thread("disconnect", self.id);

        if self.disconnect_internal(name, callable, false) {
            Ok(())
        } else {
            Err(SignalError::NotConnected {
                signal: name.to_owned(),
                callable: callable.to_string(),
            })
        }
    }

    /// Returns whether the connection existed. With `force` the reference
    /// count is ignored.
    pub(crate) fn disconnect_internal(&self, name: &str, callable: &Callable, force: bool) -> bool {
        let outcome = self.signals.lock().disconnect(name, &callable.key(), force);

        match outcome {
            None => false,
            Some(DisconnectOutcome::Released(count)) => {
                tracing::trace!(
                    object = %self.id,
                    signal = name,
                    callable = %callable,
                    count,
                    "connection reference released"
                );
                true
            }
            Some(DisconnectOutcome::Removed(slot)) => {
                forget_in_target(&slot.conn);
                tracing::debug!(
                    object = %self.id,
                    signal = name,
                    callable = %callable,
                    force,
                    "disconnected"
                );
                true
            }
        }
    }

    /// Whether `callable` is connected to the signal `name`.
    pub fn is_connected(&self, name: &str, callable: &Callable) -> bool {
        self.signals.lock().is_connected(name, &callable.key())
    }

    /// Connections of the signal `name`, in the order they were made.
    pub fn signal_connection_list(&self, name: &str) -> Vec<Connection> {
        self.signals.lock().snapshot(name).into_vec()
    }

    /// Connections of every signal of this object.
    pub fn all_signal_connections(&self) -> Vec<Connection> {
        self.signals.lock().connections().cloned().collect()
    }

    /// Connections of other objects' signals (or this object's own) whose
    /// callables target this object.
    pub fn incoming_connections(&self) -> Vec<Connection> {
        self.ledger.lock().iter().cloned().collect()
    }

    /// Number of outgoing connections flagged [`ConnectFlags::PERSIST`].
    pub fn persistent_connection_count(&self) -> usize {
        self.signals
            .lock()
            .connections()
            .filter(|conn| conn.flags.contains(ConnectFlags::PERSIST))
            .count()
    }

    /// Mute (or unmute) every signal of this object.
    ///
    /// While blocked, [`emit_signal`](Object::emit_signal) returns an empty
    /// report without invoking anything.
    pub fn set_block_signals(&self, block: bool) {
        self.block_signals.store(block, Ordering::Release);
    }

    /// Whether signals are currently blocked.
    pub fn is_blocking_signals(&self) -> bool {
        self.block_signals.load(Ordering::Acquire)
    }
}

/// Remove `conn` from the ledger of the object its callable targets.
fn forget_in_target(conn: &Connection) {
    let Some(target) = conn.callable.target().and_then(ObjectDb::resolve) else {
        return;
    };
    let forgotten = target.ledger.lock().forget(conn);
    drop(forgotten);
}

impl Drop for Object {
    fn drop(&mut self) {
        self.notification(Notification::Predelete);

        // Connections this object emits: drop them from their targets' ledgers.
        let outgoing = self.signals.get_mut().drain();
        for conn in &outgoing {
            forget_in_target(conn);
        }

        // Connections targeting this object: drop them from their sources.
        let incoming = self.ledger.get_mut().drain();
        for conn in &incoming {
            if let Some(source) = ObjectDb::resolve(conn.signal.object()) {
                source.disconnect_internal(conn.signal.name(), &conn.callable, true);
            }
        }

        self.notification(Notification::PredeleteCleanup);
        ObjectDb::unregister(self.id, &*self);
        tracing::debug!(
            object = %self.id,
            class = self.class.name,
            outgoing = outgoing.len(),
            incoming = incoming.len(),
            "destroyed object"
        );
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("class", &self.class.name)
            .field("blocking_signals", &self.is_blocking_signals())
            .finish_non_exhaustive()
    }
}
