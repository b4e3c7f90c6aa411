//! Presence announcement capability

use tracing::info;

/// Service bus announcement control
///
/// Both calls are best effort: the bus may be disconnected while WiFi
/// changes, so implementations log failures instead of returning them.
pub trait Announcer: Send + Sync + 'static {
    /// Stop advertising the device on the local service bus
    fn cancel_advertise(&self);

    /// Advertise the device again and send an announcement
    fn advertise_and_announce(&self);
}

/// Announcer used when no service bus is attached
///
/// Only records the transitions in the log.
#[derive(Debug, Clone)]
pub struct TracingAnnouncer {
    name: String,
}

impl TracingAnnouncer {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Announcer for TracingAnnouncer {
    fn cancel_advertise(&self) {
        info!(name = %self.name, "Cancel advertise");
    }

    fn advertise_and_announce(&self) {
        info!(name = %self.name, "Advertise and announce");
    }
}
