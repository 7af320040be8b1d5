//! Records delivered by an external change-notification source.

use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Created,
    Deleted,
}

/// A single change notification. Delivery order is not guaranteed and
/// duplicates are possible; consumers must tolerate both.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub locator: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: SystemTime,
}

impl ChangeEvent {
    pub fn now(locator: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            locator: locator.into(),
            kind,
            timestamp: SystemTime::now(),
        }
    }
}
