//! Scoped suspension of the presence announcement

use std::sync::Arc;
use tracing::debug;

use crate::backend::Announcer;

/// RAII guard around a WiFi disruptive operation
///
/// Creating the guard cancels advertisement; dropping it advertises and
/// announces again. Drop also runs while unwinding, so the device stays
/// discoverable after a failed or panicking transition.
#[must_use = "advertisement resumes as soon as the guard is dropped"]
pub struct AdvertisementGuard<A: Announcer> {
    announcer: Arc<A>,
}

impl<A: Announcer> AdvertisementGuard<A> {
    pub fn enter(announcer: Arc<A>) -> Self {
        debug!("Suspending advertisement");
        announcer.cancel_advertise();
        Self { announcer }
    }
}

impl<A: Announcer> Drop for AdvertisementGuard<A> {
    fn drop(&mut self) {
        debug!("Resuming advertisement");
        self.announcer.advertise_and_announce();
    }
}
