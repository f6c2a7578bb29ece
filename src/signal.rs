use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::arena::ObjectDb;
use crate::callable::{Callable, CallableKey};
use crate::dispatch::EmitReport;
use crate::error::SignalError;
use crate::hash::FastIndexMap;
use crate::id::ObjectId;
use crate::object::Object;
use crate::variant::{Variant, VariantType};

bitflags! {
    /// Behavior of a single connection.
    ///
    /// Flags combine freely; only `DEFERRED`, `ONE_SHOT` and
    /// `REFERENCE_COUNTED` change how emission and disconnection behave.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConnectFlags: u32 {
        /// Queue the call on the object's call queue instead of calling inline.
        const DEFERRED          = 1;
        /// Hint for persistence layers that the connection should be saved.
        const PERSIST           = 2;
        /// Disconnect after the first invocation attempt.
        const ONE_SHOT          = 4;
        /// Count repeated connects instead of rejecting them.
        const REFERENCE_COUNTED = 8;
        /// The signal is declared by a parent class (diagnostic only).
        const INHERITED         = 16;
    }
}

/// Declared argument of a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo {
    /// Argument name.
    pub name: String,
    /// Argument type, [`VariantType::Nil`] for "any".
    pub ty: VariantType,
}

impl ArgInfo {
    /// An argument declaration.
    pub fn new(name: impl Into<String>, ty: VariantType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared shape of a signal.
///
/// The argument list is descriptive only: emission does not check the
/// arguments it is given against it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalInfo {
    /// Signal name.
    pub name: String,
    /// Declared arguments, in order.
    pub args: Vec<ArgInfo>,
    /// Number of trailing arguments that have defaults.
    pub default_arg_count: usize,
}

impl SignalInfo {
    /// A signal without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append an argument declaration.
    pub fn with_arg(mut self, name: impl Into<String>, ty: VariantType) -> Self {
        self.args.push(ArgInfo::new(name, ty));
        self
    }

    /// Structured form for tooling.
    pub fn to_variant(&self) -> Variant {
        let args = self
            .args
            .iter()
            .map(|arg| {
                let mut entry = IndexMap::new();
                entry.insert("name".to_owned(), Variant::from(arg.name.as_str()));
                entry.insert("type".to_owned(), Variant::Int(arg.ty.code()));
                Variant::Dictionary(entry)
            })
            .collect();

        let mut map = IndexMap::new();
        map.insert("name".to_owned(), Variant::from(self.name.as_str()));
        map.insert("args".to_owned(), Variant::Array(args));
        map.insert(
            "default_args".to_owned(),
            Variant::Int(self.default_arg_count as i64),
        );
        Variant::Dictionary(map)
    }
}

/// A signal of a specific object, usable as a value.
///
/// Like [`ObjectId`] it does not keep the object alive; operations on a
/// signal whose source is gone fail with [`SignalError::SourceGone`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signal {
    object: ObjectId,
    name: Arc<str>,
}

impl Signal {
    /// The signal `name` of the object `object`.
    pub fn new(object: ObjectId, name: impl Into<Arc<str>>) -> Self {
        Self {
            object,
            name: name.into(),
        }
    }

    /// Id of the emitting object.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    fn source(&self) -> Result<Arc<Object>, SignalError> {
        ObjectDb::resolve(self.object).ok_or_else(|| SignalError::SourceGone {
            object: self.object,
            signal: self.name.to_string(),
        })
    }

    /// Emit on the source object.
    pub fn emit(&self, args: &[Variant]) -> Result<EmitReport, SignalError> {
        self.source()?.emit_signal(&self.name, args)
    }

    /// Connect on the source object.
    pub fn connect(&self, callable: Callable, flags: ConnectFlags) -> Result<(), SignalError> {
        self.source()?.connect(&self.name, callable, flags)
    }

    /// Disconnect on the source object.
    pub fn disconnect(&self, callable: &Callable) -> Result<(), SignalError> {
        self.source()?.disconnect(&self.name, callable)
    }

    /// Whether `callable` is connected; `false` once the source is gone.
    pub fn is_connected(&self, callable: &Callable) -> bool {
        self.source()
            .map(|source| source.is_connected(&self.name, callable))
            .unwrap_or(false)
    }

    /// Current connections; empty once the source is gone.
    pub fn connections(&self) -> Vec<Connection> {
        self.source()
            .map(|source| source.signal_connection_list(&self.name))
            .unwrap_or_default()
    }
}

/// A callable bound to a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// The emitting signal.
    pub signal: Signal,
    /// The target.
    pub callable: Callable,
    /// Behavior flags.
    pub flags: ConnectFlags,
}

impl Connection {
    /// Structured form for tooling.
    pub fn to_variant(&self) -> Variant {
        let mut signal = IndexMap::new();
        signal.insert("object".to_owned(), Variant::Object(self.signal.object));
        signal.insert("name".to_owned(), Variant::from(self.signal.name()));

        let mut map = IndexMap::new();
        map.insert("signal".to_owned(), Variant::Dictionary(signal));
        map.insert("callable".to_owned(), Variant::from(self.callable.to_string()));
        map.insert("flags".to_owned(), Variant::from(self.flags.bits()));
        Variant::Dictionary(map)
    }
}

/// Emission snapshot; most signals have only a handful of connections.
pub(crate) type Snapshot = SmallVec<[Connection; 8]>;

#[derive(Debug)]
pub(crate) struct ConnectionSlot {
    pub(crate) conn: Connection,
    /// Outstanding connects of a reference-counted connection; zero for
    /// plain ones.
    pub(crate) reference_count: i32,
}

#[derive(Debug, Default)]
pub(crate) struct SignalData {
    /// Declaration of a user signal, `None` for built-in ones.
    pub(crate) user: Option<SignalInfo>,
    pub(crate) slots: FastIndexMap<CallableKey, ConnectionSlot>,
}

pub(crate) enum ConnectOutcome {
    Inserted,
    Referenced(i32),
}

pub(crate) enum DisconnectOutcome {
    Removed(ConnectionSlot),
    Released(i32),
}

/// Per-object map from signal name to declaration and connections.
///
/// Built-in signals only get an entry once something connects to them;
/// user signals have one from declaration until removal.
#[derive(Debug, Default)]
pub(crate) struct SignalTable {
    map: FastIndexMap<Arc<str>, SignalData>,
}

impl SignalTable {
    pub(crate) fn get(&self, name: &str) -> Option<&SignalData> {
        self.map.get(name)
    }

    pub(crate) fn has_user_signal(&self, name: &str) -> bool {
        self.map.get(name).is_some_and(|data| data.user.is_some())
    }

    pub(crate) fn declare(&mut self, info: SignalInfo) -> Result<(), SignalError> {
        let name: Arc<str> = Arc::from(info.name.as_str());
        let data = self.map.entry(name).or_default();
        if data.user.is_some() {
            return Err(SignalError::AlreadyDeclared { signal: info.name });
        }
        data.user = Some(info);
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<SignalData> {
        self.map.shift_remove(name)
    }

    pub(crate) fn user_signals(&self) -> impl Iterator<Item = &SignalInfo> {
        self.map.values().filter_map(|data| data.user.as_ref())
    }

    pub(crate) fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.map
            .values()
            .flat_map(|data| data.slots.values().map(|slot| &slot.conn))
    }

    pub(crate) fn snapshot(&self, name: &str) -> Snapshot {
        self.map
            .get(name)
            .map(|data| data.slots.values().map(|slot| slot.conn.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn is_connected(&self, name: &str, key: &CallableKey) -> bool {
        self.map
            .get(name)
            .is_some_and(|data| data.slots.contains_key(key))
    }

    pub(crate) fn connect(&mut self, conn: Connection) -> Result<ConnectOutcome, SignalError> {
        let data = self
            .map
            .entry(Arc::clone(conn.signal.name_arc()))
            .or_default();
        let key = conn.callable.key();

        if let Some(slot) = data.slots.get_mut(&key) {
            if !conn.flags.contains(ConnectFlags::REFERENCE_COUNTED) {
                return Err(SignalError::AlreadyConnected {
                    signal: conn.signal.name().to_owned(),
                    callable: conn.callable.to_string(),
                });
            }
            cov_mark::hit!(reference_counted_connect_increments);
            slot.reference_count += 1;
            return Ok(ConnectOutcome::Referenced(slot.reference_count));
        }

        let reference_count = i32::from(conn.flags.contains(ConnectFlags::REFERENCE_COUNTED));
        data.slots.insert(
            key,
            ConnectionSlot {
                conn,
                reference_count,
            },
        );
        Ok(ConnectOutcome::Inserted)
    }

    /// Drop one reference to a connection, or the whole connection when
    /// `force` is set or no references remain. `None` when it does not exist.
    pub(crate) fn disconnect(
        &mut self,
        name: &str,
        key: &CallableKey,
        force: bool,
    ) -> Option<DisconnectOutcome> {
        let data = self.map.get_mut(name)?;
        let slot = data.slots.get_mut(key)?;

        if !force {
            slot.reference_count -= 1;
            if slot.reference_count > 0 {
                return Some(DisconnectOutcome::Released(slot.reference_count));
            }
        }

        let removed = data.slots.shift_remove(key)?;
        if data.user.is_none() && data.slots.is_empty() {
            self.map.shift_remove(name);
        }
        Some(DisconnectOutcome::Removed(removed))
    }

    /// Empty the table, handing back every connection it held.
    pub(crate) fn drain(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.map)
            .into_values()
            .flat_map(|data| data.slots.into_values().map(|slot| slot.conn))
            .collect()
    }
}
