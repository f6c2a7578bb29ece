//! Error types.

use thiserror::Error;

use crate::id::ObjectId;
use crate::variant::VariantType;

/// Failures of the slot table behind the object database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// The table already holds its maximum number of slots.
    #[error("object table is full ({max} slots)")]
    CapacityExhausted {
        /// The configured slot ceiling.
        max: u32,
    },
    /// The id does not name a live slot.
    #[error("{id:?} does not name a live object")]
    Stale {
        /// The rejected id.
        id: ObjectId,
    },
    /// The free list pointed at an occupied slot, or a live slot held no value.
    #[error("object table slot {slot} is corrupted")]
    Corrupted {
        /// Index of the inconsistent slot.
        slot: u32,
    },
}

/// Reported, recoverable failures of signal operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The signal is neither built into the class nor user-declared.
    #[error("object {object} of class '{class}' has no signal '{signal}'")]
    UnknownSignal {
        /// Emitting object.
        object: ObjectId,
        /// Class name of the emitting object.
        class: &'static str,
        /// Requested signal.
        signal: String,
    },
    /// A plain connection to this callable already exists.
    #[error("signal '{signal}' is already connected to {callable}")]
    AlreadyConnected {
        /// Signal name.
        signal: String,
        /// Display form of the callable.
        callable: String,
    },
    /// Disconnect was asked for a connection that does not exist.
    #[error("no connection from signal '{signal}' to {callable}")]
    NotConnected {
        /// Signal name.
        signal: String,
        /// Display form of the callable.
        callable: String,
    },
    /// The callable can never be invoked.
    #[error("cannot connect signal '{signal}' to an invalid callable")]
    InvalidCallable {
        /// Signal name.
        signal: String,
    },
    /// Signal declarations need a name.
    #[error("signal name cannot be empty")]
    EmptyName,
    /// A user signal may not shadow a built-in one.
    #[error("user signal '{signal}' conflicts with a built-in signal of '{class}'")]
    BuiltinConflict {
        /// Signal name.
        signal: String,
        /// Class declaring the built-in signal.
        class: &'static str,
    },
    /// The user signal already exists on this object.
    #[error("signal '{signal}' is already declared")]
    AlreadyDeclared {
        /// Signal name.
        signal: String,
    },
    /// Only user signals can be removed.
    #[error("signal '{signal}' is built into '{class}' and cannot be removed")]
    NotRemovable {
        /// Signal name.
        signal: String,
        /// Class declaring the signal.
        class: &'static str,
    },
    /// The object behind a [`Signal`](crate::Signal) value no longer exists.
    #[error("source object {object} of signal '{signal}' no longer exists")]
    SourceGone {
        /// Stale source id.
        object: ObjectId,
        /// Signal name.
        signal: String,
    },
}

/// Why invoking a callable failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The receiver has no such method.
    #[error("method not found")]
    InvalidMethod,
    /// An argument had the wrong type.
    #[error("argument {index} should be of type {expected:?}")]
    InvalidArgument {
        /// Zero-based argument position.
        index: usize,
        /// Type the callee wanted.
        expected: VariantType,
    },
    /// More arguments than the callee accepts.
    #[error("too many arguments, expected {expected}")]
    TooManyArguments {
        /// Accepted argument count.
        expected: usize,
    },
    /// Fewer arguments than the callee requires.
    #[error("too few arguments, expected {expected}")]
    TooFewArguments {
        /// Required argument count.
        expected: usize,
    },
    /// The receiving object no longer exists.
    #[error("target instance is null")]
    InstanceIsNull,
    /// The callee reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}
