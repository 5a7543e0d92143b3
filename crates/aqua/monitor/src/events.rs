//! Events broadcast by the monitor.

use aqua_types::{FindingKey, PondId};

/// Things collaborators (notification senders, exporters) may react to.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Pond was registered or updated.
    PondRegistered(PondId),

    /// A finding became active.
    FindingActivated { pond_id: PondId, key: FindingKey },

    /// A finding was resolved.
    FindingResolved { pond_id: PondId, key: FindingKey },

    /// Device reported offline; live-reading findings clear after the grace.
    DeviceOffline(PondId),

    /// Device reported online again.
    DeviceOnline(PondId),

    /// Pending offline clear ran.
    OfflineCleared { pond_id: PondId, cleared: usize },

    /// Series were reset for a new stocking cycle.
    CycleStarted(PondId),
}
