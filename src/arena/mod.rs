// Arena-based storage for object identities
//
// - slot_table: the generational SlotTable<T> (growth, free list, validators)
// - object_db: the global table of Weak<Object> and the ObjectDb front end
//
// ObjectId is the only thing that leaves this module: callers never see a
// slot or a pointer, only ids that either resolve or don't.

pub mod object_db;
pub mod slot_table;

pub use object_db::ObjectDb;
pub use slot_table::SlotTable;
