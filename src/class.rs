//! Static class descriptors and per-type behavior hooks.
//!
//! A class is a `&'static ClassInfo`: a name, an optional parent and the
//! signals every instance of the class has from birth. Behavior that differs
//! per concrete type (method calls, notifications) lives behind the
//! [`ObjectKind`] trait, resolved once when the object is built.

use crate::error::CallError;
use crate::object::Object;
use crate::signal::{ArgInfo, SignalInfo};
use crate::variant::{Variant, VariantType};

/// Declared argument of a built-in signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name.
    pub name: &'static str,
    /// Argument type.
    pub ty: VariantType,
}

/// Built-in signal declared by a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSpec {
    /// Signal name.
    pub name: &'static str,
    /// Declared arguments, in order.
    pub args: &'static [ArgSpec],
}

impl ArgSpec {
    /// An argument declaration.
    pub const fn new(name: &'static str, ty: VariantType) -> Self {
        Self { name, ty }
    }
}

impl SignalSpec {
    /// A signal declaration.
    pub const fn new(name: &'static str, args: &'static [ArgSpec]) -> Self {
        Self { name, args }
    }

    /// Owned form of this declaration.
    pub fn to_info(&self) -> SignalInfo {
        SignalInfo {
            name: self.name.to_owned(),
            args: self
                .args
                .iter()
                .map(|arg| ArgInfo::new(arg.name, arg.ty))
                .collect(),
            default_arg_count: 0,
        }
    }
}

/// Static description of a class.
#[derive(Debug)]
pub struct ClassInfo {
    /// Class name.
    pub name: &'static str,
    /// Parent class, `None` for the root.
    pub parent: Option<&'static ClassInfo>,
    /// Signals declared by this class itself (not its parents).
    pub signals: &'static [SignalSpec],
    /// Whether ids of instances carry the reference-counted bit.
    pub ref_counted: bool,
}

/// Root class of every object.
pub static OBJECT_CLASS: ClassInfo = ClassInfo {
    name: "Object",
    parent: None,
    signals: &[
        SignalSpec::new("script_changed", &[]),
        SignalSpec::new("property_list_changed", &[]),
    ],
    ref_counted: false,
};

/// Base of the reference-counted category.
pub static REF_COUNTED_CLASS: ClassInfo = ClassInfo {
    name: "RefCounted",
    parent: Some(&OBJECT_CLASS),
    signals: &[],
    ref_counted: true,
};

impl ClassInfo {
    /// Iterate from this class up to the root.
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static ClassInfo> {
        std::iter::successors(Some(self), |class| class.parent)
    }

    /// Whether this class is `name` or inherits from it.
    pub fn is_class(&'static self, name: &str) -> bool {
        self.ancestry().any(|class| class.name == name)
    }

    /// Find a built-in signal anywhere in the class chain.
    ///
    /// The returned class is the one that declares the signal.
    pub fn find_signal(
        &'static self,
        name: &str,
    ) -> Option<(&'static ClassInfo, &'static SignalSpec)> {
        self.ancestry().find_map(|class| {
            class
                .signals
                .iter()
                .find(|signal| signal.name == name)
                .map(|signal| (class, signal))
        })
    }

    /// Whether the class chain declares `name`.
    pub fn has_signal(&'static self, name: &str) -> bool {
        self.find_signal(name).is_some()
    }

    /// All built-in signals, most derived class first.
    pub fn signal_list(&'static self) -> impl Iterator<Item = &'static SignalSpec> {
        self.ancestry().flat_map(|class| class.signals.iter())
    }
}

/// Lifecycle and custom notifications delivered to an [`ObjectKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Sent once the object is registered and fully built.
    PostInitialize,
    /// Sent when the object starts being destroyed, before teardown.
    Predelete,
    /// Sent after the code backing the kind has been reloaded.
    ExtensionReloaded,
    /// Sent after teardown, right before the id is released.
    PredeleteCleanup,
    /// Application-defined notification.
    Custom(i32),
}

impl Notification {
    /// Numeric code of the notification.
    pub fn code(self) -> i32 {
        match self {
            Notification::PostInitialize => 0,
            Notification::Predelete => 1,
            Notification::ExtensionReloaded => 2,
            Notification::PredeleteCleanup => 3,
            Notification::Custom(code) => code,
        }
    }
}

/// Per-type capabilities of an object.
///
/// Implemented once per concrete type and handed to
/// [`Object::new`](crate::Object::new). Every method has a default so a
/// kind only implements what it supports.
pub trait ObjectKind: Send + Sync + 'static {
    /// Class of objects of this kind.
    fn class(&self) -> &'static ClassInfo {
        &OBJECT_CLASS
    }

    /// Handle a method call addressed to `this`.
    ///
    /// Called without any lock held, so it may freely connect, disconnect
    /// or emit on `this` or other objects.
    fn call(&self, this: &Object, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
        let _ = (this, method, args);
        Err(CallError::InvalidMethod)
    }

    /// React to a notification.
    fn notification(&self, this: &Object, what: Notification) {
        let _ = (this, what);
    }

    /// Whether connecting to an undeclared signal should declare it.
    ///
    /// Script-backed kinds whose signals are only known at run time return
    /// `true`.
    fn declares_signals_on_connect(&self) -> bool {
        false
    }
}

/// Kind of a plain object with no methods of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseObject;

impl ObjectKind for BaseObject {}
