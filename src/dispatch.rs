//! Signal emission.
//!
//! [`Object::emit_signal`] copies the connection list of the signal, releases
//! the table lock and then walks the copy in connection order. Handlers run
//! without any lock held, so they may connect, disconnect, emit or destroy
//! objects; changes they make to the connection list only show up in the next
//! emission.
//!
//! Per connection:
//! - a connection whose target object is gone is skipped,
//! - `DEFERRED` connections are handed to the object's
//!   [`CallQueue`](crate::CallQueue) and count as delivered,
//! - everything else is called inline; an error is recorded in the
//!   [`EmitReport`] and the remaining connections still run,
//! - `ONE_SHOT` connections are disconnected right before the call or
//!   hand-off, so the attempt consumes them whether it succeeds or not; one
//!   already consumed by a nested emission is not called again.

use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::callable::Callable;
use crate::error::{CallError, SignalError};
use crate::id::ObjectId;
use crate::object::Object;
use crate::signal::ConnectFlags;
use crate::variant::Variant;

/// A connection whose inline call failed during an emission.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFailure {
    /// The callable that failed.
    pub callable: Callable,
    /// What it returned.
    pub error: CallError,
}

/// Outcome of one emission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitReport {
    delivered: usize,
    deferred: usize,
    failures: Vec<TargetFailure>,
}

impl EmitReport {
    /// Connections that were called successfully or handed to the call
    /// queue.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// How many of the delivered calls were deferred.
    pub fn deferred(&self) -> usize {
        self.deferred
    }

    /// Inline calls that returned an error.
    pub fn failures(&self) -> &[TargetFailure] {
        &self.failures
    }

    /// Whether no call failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Object {
    /// Emit the signal `name` with `args`.
    ///
    /// Returns [`SignalError::UnknownSignal`] when the signal is declared
    /// neither by the class nor on the instance. Failures of individual
    /// connections do not make the emission fail; they are listed in the
    /// returned report.
    pub fn emit_signal(&self, name: &str, args: &[Variant]) -> Result<EmitReport, SignalError> {
        if self.is_blocking_signals() {
            cov_mark::hit!(blocked_emission_is_silent);
            return Ok(EmitReport::default());
        }
        self.emission.check_thread("emit", self.id());

        let snapshot = {
            let table = self.signals.lock();
            if table.get(name).is_none() && !self.class().has_signal(name) {
                return Err(self.unknown_signal(name));
            }
            table.snapshot(name)
        };

        let _guard = self.emission.enter();
        let mut report = EmitReport::default();

        for conn in snapshot {
            if !conn.callable.target_alive() {
                cov_mark::hit!(dead_target_skipped);
                tracing::trace!(
                    object = %self.id(),
                    signal = name,
                    callable = %conn.callable,
                    "skipping connection to a destroyed object"
                );
                continue;
            }

            // A one-shot connection belongs to the first emission that reaches it.
            if conn.flags.contains(ConnectFlags::ONE_SHOT)
                && !self.disconnect_internal(name, &conn.callable, true)
            {
                cov_mark::hit!(one_shot_already_consumed);
                continue;
            }

            if conn.flags.contains(ConnectFlags::DEFERRED) {
                self.call_queue
                    .push_callable(conn.callable.clone(), args.to_vec());
                report.delivered += 1;
                report.deferred += 1;
            } else {
                match conn.callable.call(args) {
                    Ok(_) => report.delivered += 1,
                    Err(error) => {
                        tracing::error!(
                            object = %self.id(),
                            signal = name,
                            callable = %conn.callable,
                            %error,
                            "error calling connected method"
                        );
                        report.failures.push(TargetFailure {
                            callable: conn.callable.clone(),
                            error,
                        });
                    }
                }
            }
        }

        tracing::trace!(
            object = %self.id(),
            signal = name,
            delivered = report.delivered,
            deferred = report.deferred,
            failed = report.failures.len(),
            "emitted signal"
        );
        Ok(report)
    }
}

// Debug-only thread affinity tracking
//
// Signal state of one object is meant to be driven from one thread at a
// time. While an emission runs, the emitting thread is remembered here and
// connect/disconnect/emit from any other thread logs a warning. The check is
// advisory: the call proceeds either way. Release builds skip it entirely.

#[derive(Debug, Clone, Copy)]
struct ActiveEmission {
    thread: ThreadId,
    depth: usize,
}

#[derive(Debug, Default)]
pub(crate) struct EmissionState {
    active: Mutex<Option<ActiveEmission>>,
}

impl EmissionState {
    pub(crate) fn check_thread(&self, operation: &'static str, object: ObjectId) {
        if !cfg!(debug_assertions) {
            return;
        }
        let active = *self.active.lock();
        if let Some(active) = active
            && active.thread != thread::current().id()
        {
            cov_mark::hit!(foreign_thread_during_emission);
            tracing::warn!(
                %object,
                operation,
                emitting_thread = ?active.thread,
                "signal state used from another thread during an emission"
            );
        }
    }

    pub(crate) fn enter(&self) -> EmissionGuard<'_> {
        if !cfg!(debug_assertions) {
            return EmissionGuard {
                state: self,
                tracked: false,
            };
        }

        let current = thread::current().id();
        let mut active = self.active.lock();
        let tracked = match active.as_mut() {
            Some(active) if active.thread == current => {
                active.depth += 1;
                true
            }
            // Another thread is emitting; it stays the owner.
            Some(_) => false,
            None => {
                *active = Some(ActiveEmission {
                    thread: current,
                    depth: 1,
                });
                true
            }
        };
        EmissionGuard {
            state: self,
            tracked,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }
}

/// Marks an emission in progress; restores the previous state on drop, also
/// when a handler panics.
pub(crate) struct EmissionGuard<'a> {
    state: &'a EmissionState,
    tracked: bool,
}

impl Drop for EmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.tracked {
            return;
        }
        let mut active = self.state.active.lock();
        if let Some(current) = active.as_mut() {
            current.depth -= 1;
            if current.depth == 0 {
                *active = None;
            }
        }
    }
}
