// Object database - the process-wide handle registry
//
// One SlotTable of Weak<Object> behind a single parking_lot mutex. The table
// holds weak references only: objects are owned by whoever holds their Arc,
// and an object that is being dropped no longer upgrades, so resolve() can
// never hand out a dying object even before its id is released.
//
// LOCK DISCIPLINE:
// The lock is held only for the O(1) table access itself. Upgrading a Weak,
// and anything that may drop an Arc<Object>, happens after the guard is gone:
// dropping the last Arc runs Object::drop, which unregisters and would
// otherwise deadlock on this same lock.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::SlotTable;
use crate::id::ObjectId;
use crate::object::Object;

/// Global object table.
static OBJECT_DB: Mutex<SlotTable<Weak<Object>>> = Mutex::new(SlotTable::new());

/// Process-wide registry mapping [`ObjectId`]s to live objects.
pub struct ObjectDb;

impl ObjectDb {
    /// Allocate an id for `object`.
    ///
    /// Running out of slots is unrecoverable and aborts the process.
    pub(crate) fn register(object: Weak<Object>, ref_counted: bool) -> ObjectId {
        let inserted = OBJECT_DB.lock().insert(object, ref_counted);
        match inserted {
            Ok(id) => {
                tracing::trace!(object = %id, ref_counted, "registered object");
                id
            }
            Err(error) => {
                tracing::error!(%error, "object table exhausted");
                std::process::abort();
            }
        }
    }

    /// Release the id of `object`, which must be the object it was issued to.
    ///
    /// A mismatch (double release, stale id, foreign object) is an invariant
    /// violation: debug builds panic, release builds log it and leave the
    /// table untouched.
    pub(crate) fn unregister(id: ObjectId, object: *const Object) {
        let removed = {
            let mut db = OBJECT_DB.lock();
            let foreign = cfg!(debug_assertions)
                && db
                    .get(id)
                    .is_some_and(|stored| !std::ptr::eq(stored.as_ptr(), object));
            if foreign {
                Err(format!("{id:?} is registered to a different object"))
            } else {
                db.remove(id).map_err(|error| error.to_string())
            }
        };

        match removed {
            Ok(_) => tracing::trace!(object = %id, "unregistered object"),
            Err(error) if cfg!(debug_assertions) => {
                panic!("object table invariant violated: {error}")
            }
            Err(error) => tracing::error!(object = %id, %error, "failed to unregister object"),
        }
    }

    /// The live object named by `id`, or `None` when the id is stale, was
    /// never issued, or its object is being destroyed.
    pub fn resolve(id: ObjectId) -> Option<Arc<Object>> {
        let weak = OBJECT_DB.lock().get(id).cloned()?;
        weak.upgrade()
    }

    /// Whether `id` names a live object.
    pub fn contains(id: ObjectId) -> bool {
        OBJECT_DB
            .lock()
            .get(id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of registered ids.
    pub fn count() -> usize {
        OBJECT_DB.lock().len()
    }

    /// Ids of every registered object, in slot order.
    pub fn live_ids() -> Vec<ObjectId> {
        OBJECT_DB.lock().iter().map(|(id, _)| id).collect()
    }

    /// Visit every live object.
    ///
    /// The table is snapshotted first, so the visitor may create or destroy
    /// objects.
    pub fn for_each_live(mut f: impl FnMut(&Arc<Object>)) {
        let weaks: Vec<Weak<Object>> = OBJECT_DB
            .lock()
            .iter()
            .map(|(_, weak)| weak.clone())
            .collect();

        for weak in weaks {
            if let Some(object) = weak.upgrade() {
                f(&object);
            }
        }
    }

    /// Log every object that is still registered and return how many there
    /// are. Meant to be called at shutdown.
    pub fn report_leaks() -> usize {
        let mut leaked = 0;
        Self::for_each_live(|object| {
            leaked += 1;
            tracing::warn!(
                object = %object.id(),
                class = object.class_name(),
                "leaked instance"
            );
        });
        if leaked > 0 {
            tracing::warn!(leaked, "object instances leaked at exit");
        }
        leaked
    }
}
