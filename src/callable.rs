use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::arena::ObjectDb;
use crate::error::CallError;
use crate::id::ObjectId;
use crate::variant::Variant;

type CallFn = dyn Fn(&[Variant]) -> Result<Variant, CallError> + Send + Sync;

/// Source of identities for closure-backed callables.
static NEXT_CUSTOM_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque invocable value that signals can be connected to.
///
/// Callables are compared by identity, never by behavior:
/// - a method callable is identified by its target object and method name,
///   so two separately built `Callable::method(id, "on_hit")` are equal;
/// - a closure callable gets a fresh identity when it is built and every
///   clone shares it.
///
/// A callable is a value: it never borrows the object it targets, and a
/// stale target only shows up when the callable is invoked.
#[derive(Clone)]
pub struct Callable {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Method {
        target: ObjectId,
        method: Arc<str>,
    },
    Custom {
        id: u64,
        target: Option<ObjectId>,
        name: Arc<str>,
        func: Arc<CallFn>,
    },
}

/// Structural identity of a [`Callable`], used as the connection map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallableKey {
    /// Identity of a method callable.
    Method(ObjectId, Arc<str>),
    /// Identity of a closure callable.
    Custom(u64),
}

impl Callable {
    /// Call `method` on the object named by `target`.
    ///
    /// The method is looked up through the target's
    /// [`ObjectKind`](crate::ObjectKind) at call time.
    pub fn method(target: ObjectId, method: impl Into<Arc<str>>) -> Self {
        Self {
            repr: Repr::Method {
                target,
                method: method.into(),
            },
        }
    }

    /// Wrap a closure that belongs to no object.
    pub fn from_fn<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[Variant]) -> Result<Variant, CallError> + Send + Sync + 'static,
    {
        Self::custom(None, name.into(), Arc::new(func))
    }

    /// Wrap a closure that acts on behalf of `target`.
    ///
    /// Connections through such a callable are recorded in the target's
    /// ledger and torn down when the target is destroyed; emission skips the
    /// callable once the target is gone.
    pub fn from_fn_on<F>(target: ObjectId, name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[Variant]) -> Result<Variant, CallError> + Send + Sync + 'static,
    {
        Self::custom(Some(target), name.into(), Arc::new(func))
    }

    fn custom(target: Option<ObjectId>, name: Arc<str>, func: Arc<CallFn>) -> Self {
        let id = NEXT_CUSTOM_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            repr: Repr::Custom {
                id,
                target,
                name,
                func,
            },
        }
    }

    /// Identity used for connect/disconnect matching.
    pub fn key(&self) -> CallableKey {
        match &self.repr {
            Repr::Method { target, method } => CallableKey::Method(*target, Arc::clone(method)),
            Repr::Custom { id, .. } => CallableKey::Custom(*id),
        }
    }

    /// The object this callable acts on, if any.
    pub fn target(&self) -> Option<ObjectId> {
        match &self.repr {
            Repr::Method { target, .. } => Some(*target),
            Repr::Custom { target, .. } => *target,
        }
    }

    /// Method name for method callables, closure name otherwise.
    pub fn name(&self) -> &str {
        match &self.repr {
            Repr::Method { method, .. } => &**method,
            Repr::Custom { name, .. } => &**name,
        }
    }

    /// Whether this is a method callable.
    pub fn is_method(&self) -> bool {
        matches!(self.repr, Repr::Method { .. })
    }

    /// A method callable needs a target and a method name.
    pub fn is_valid(&self) -> bool {
        match &self.repr {
            Repr::Method { target, method } => target.is_valid() && !method.is_empty(),
            Repr::Custom { target, .. } => target.is_none_or(ObjectId::is_valid),
        }
    }

    /// Whether the target object (if any) is still registered.
    pub(crate) fn target_alive(&self) -> bool {
        match self.target() {
            Some(target) => ObjectDb::contains(target),
            None => true,
        }
    }

    /// Invoke the callable synchronously.
    pub fn call(&self, args: &[Variant]) -> Result<Variant, CallError> {
        match &self.repr {
            Repr::Method { target, method } => {
                let object = ObjectDb::resolve(*target).ok_or(CallError::InstanceIsNull)?;
                object.call(method, args)
            }
            Repr::Custom { target, func, .. } => {
                if let Some(target) = target
                    && !ObjectDb::contains(*target)
                {
                    return Err(CallError::InstanceIsNull);
                }
                func(args)
            }
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (
                Repr::Method { target, method },
                Repr::Method {
                    target: other_target,
                    method: other_method,
                },
            ) => target == other_target && method == other_method,
            (Repr::Custom { id, .. }, Repr::Custom { id: other_id, .. }) => id == other_id,
            _ => false,
        }
    }
}

impl Eq for Callable {}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Method { target, method } => write!(f, "Object({target})::{method}"),
            Repr::Custom {
                target: Some(target),
                name,
                ..
            } => write!(f, "Object({target})::<{name}>"),
            Repr::Custom { name, .. } => write!(f, "<{name}>"),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({self})")
    }
}
