#![deny(missing_docs)]

//! Object handles and per-object signals.
//!
//! Every [`Object`] is registered in a process-wide table and named by an
//! [`ObjectId`]: a 64-bit handle that resolves to the object while it lives
//! and to nothing afterwards, even once its slot has been reused. Objects
//! declare named signals; callables connect to them and run whenever the
//! signal is emitted.
//!
//! # Quick Start
//!
//! ```ignore
//! use objcore::{BaseObject, Callable, ConnectFlags, Object, SignalInfo, Variant};
//!
//! let player = Object::new(BaseObject);
//! player.add_user_signal(SignalInfo::new("health_changed"))?;
//!
//! // Plain connection, runs on every emission
//! player.connect(
//!     "health_changed",
//!     Callable::from_fn("update_bar", |args| {
//!         println!("health: {:?}", args[0]);
//!         Ok(Variant::Nil)
//!     }),
//!     ConnectFlags::empty(),
//! )?;
//!
//! // Runs once, then disconnects itself
//! player.connect(
//!     "health_changed",
//!     Callable::from_fn("first_hit", |_| {
//!         println!("first hit!");
//!         Ok(Variant::Nil)
//!     }),
//!     ConnectFlags::ONE_SHOT,
//! )?;
//!
//! let report = player.emit_signal("health_changed", &[Variant::Int(90)])?;
//! assert_eq!(report.delivered(), 2);
//! ```
//!
//! # Core Types
//!
//! - [`ObjectId`] - Generational handle. Cheap to copy, never dangles.
//! - [`ObjectDb`] - The registry. [`resolve()`](ObjectDb::resolve) turns an id
//!   back into an object.
//! - [`Object`] - Signals, connections and lifecycle of one object.
//! - [`Callable`] - Connection target: a method on an object or a closure.
//! - [`MessageQueue`] - Where `DEFERRED` connections and
//!   [`call_deferred`](Object::call_deferred) calls wait to be flushed.
//!
//! # Handles
//!
//! ```ignore
//! let id = player.id();
//! assert!(ObjectDb::resolve(id).is_some());
//!
//! drop(player);
//! assert!(ObjectDb::resolve(id).is_none()); // forever, even if the slot is reused
//! ```
//!
//! # Connection flags
//!
//! ```ignore
//! ConnectFlags::DEFERRED           // queue the call instead of running it inline
//! ConnectFlags::ONE_SHOT           // disconnect after the first emission
//! ConnectFlags::REFERENCE_COUNTED  // connect N times, disconnect N times
//! ConnectFlags::PERSIST            // marker for serializers
//! ```
//!
//! # Emission
//!
//! Emission works on a copy of the connection list, so handlers may connect
//! and disconnect freely; such changes apply from the next emission on. A
//! failing handler does not stop the others: its error is listed in the
//! returned [`EmitReport`].
//!
//! # Destruction
//!
//! Dropping the last `Arc<Object>` removes every connection the object
//! emits and every connection targeting it, then releases its id.
//!
//! ```ignore
//! drop(receiver);
//! assert!(sender.signal_connection_list("health_changed").is_empty());
//! ```

// Internal modules
pub(crate) mod arena;
mod callable;
mod class;
mod dispatch;
mod error;
mod hash;
mod id;
mod ledger;
mod object;
mod queue;
mod signal;
mod variant;

// Handles
pub use arena::{ObjectDb, SlotTable};
pub use id::{MAX_SLOTS, ObjectId, REF_COUNTED_BIT, SLOT_BITS, VALIDATOR_BITS};

// Objects and classes
pub use class::{
    ArgSpec, BaseObject, ClassInfo, Notification, OBJECT_CLASS, ObjectKind, REF_COUNTED_CLASS,
    SignalSpec,
};
pub use object::{Object, ObjectBuilder};

// Signals
pub use callable::{Callable, CallableKey};
pub use dispatch::{EmitReport, TargetFailure};
pub use signal::{ArgInfo, ConnectFlags, Connection, Signal, SignalInfo};

// Deferred calls
pub use queue::{
    CallQueue, DEFAULT_DEBOUNCE, DEFAULT_MAX_DEBOUNCE, DeferredCall, FlushReport, MessageQueue,
    QueueLoop,
};

// Values and errors
pub use error::{CallError, SignalError, SlotError};
pub use hash::FastHashBuilder;
pub use variant::{Variant, VariantType};
