use crate::prelude::*;

use std::sync::{Arc, RwLock};

/// Holds the one current datagram of the process.
///
/// The interpreter is the only writer; the publisher and the HTTP handlers
/// read copies. Guards never outlive the call that takes them.
#[derive(Clone)]
pub struct SnapshotCell {
    current: Arc<RwLock<Datagram>>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(Datagram::empty())
    }
}

impl SnapshotCell {
    pub fn new(initial: Datagram) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> Datagram {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, datagram: Datagram) {
        match self.current.write() {
            Ok(mut guard) => *guard = datagram,
            Err(poisoned) => *poisoned.into_inner() = datagram,
        }
    }
}
