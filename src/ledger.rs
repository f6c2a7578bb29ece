// Connection ledger - the receiving side of connections
//
// Every connection whose callable targets an object is recorded twice: in the
// source's SignalTable (forward, used by emission) and in the target's ledger
// (reverse, used at destruction). When the target dies it walks its ledger and
// asks each source to drop the connection, so no source ever needs to scan
// other objects' tables.

use std::sync::Arc;

use crate::callable::CallableKey;
use crate::hash::FastIndexMap;
use crate::id::ObjectId;
use crate::signal::Connection;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LedgerKey {
    source: ObjectId,
    signal: Arc<str>,
    callable: CallableKey,
}

impl LedgerKey {
    fn of(conn: &Connection) -> Self {
        Self {
            source: conn.signal.object(),
            signal: Arc::clone(conn.signal.name_arc()),
            callable: conn.callable.key(),
        }
    }
}

/// Connections other objects hold towards this one.
#[derive(Debug, Default)]
pub(crate) struct ConnectionLedger {
    entries: FastIndexMap<LedgerKey, Connection>,
}

impl ConnectionLedger {
    pub(crate) fn record(&mut self, conn: Connection) {
        self.entries.insert(LedgerKey::of(&conn), conn);
    }

    pub(crate) fn forget(&mut self, conn: &Connection) -> Option<Connection> {
        self.entries.shift_remove(&LedgerKey::of(conn))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.entries.values()
    }

    pub(crate) fn drain(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::signal::{ConnectFlags, Signal};

    fn conn(source: u64, signal: &str, target: ObjectId) -> Connection {
        Connection {
            signal: Signal::new(ObjectId::from_u64(source), signal),
            callable: Callable::method(target, "on_event"),
            flags: ConnectFlags::empty(),
        }
    }

    #[test]
    fn entries_are_keyed_by_source_signal_and_callable() {
        let target = ObjectId::from_u64(7 << 24);
        let mut ledger = ConnectionLedger::default();

        ledger.record(conn(1 << 24, "a", target));
        ledger.record(conn(1 << 24, "b", target));
        ledger.record(conn(2 << 24, "a", target));
        ledger.record(conn(1 << 24, "a", target));
        assert_eq!(ledger.len(), 3);

        assert!(ledger.forget(&conn(1 << 24, "b", target)).is_some());
        assert!(ledger.forget(&conn(1 << 24, "b", target)).is_none());
        assert_eq!(ledger.drain().len(), 2);
        assert_eq!(ledger.len(), 0);
    }
}
