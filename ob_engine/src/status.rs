//! The single, totally-ordered status variable that coordinates the
//! engine's threads: `Error < Stop < Ready < Boot < Wait < Run`.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Status {
    Error = 0,
    Stop = 1,
    Ready = 2,
    Boot = 3,
    Wait = 4,
    Run = 5,
}

/// Lock-protected status cell. All reads and writes go through a short
/// critical section, mirroring the original's spinlock-guarded accessors;
/// a `Mutex` is the equivalent here since the protected region is a single
/// field read or write.
pub struct StatusCell(Mutex<Status>);

impl StatusCell {
    pub fn new(initial: Status) -> Self {
        Self(Mutex::new(initial))
    }

    pub fn get(&self) -> Status {
        *self.0.lock().expect("status mutex poisoned")
    }

    pub fn set(&self, status: Status) {
        *self.0.lock().expect("status mutex poisoned") = status;
    }
}
