//! Routes stellar-type switch notifications to the binary switch log.

use tracing::trace;

use crate::context::{RunContext, SwitchObserver};
use crate::metrics::METRICS;
use crate::physics::Notification;

/// Forwards stellar-type switches to the currently evolving binary.
///
/// A switch raised while no binary is published (during construction,
/// between iterations, or in a single-star sweep) is dropped. Other
/// notification kinds are ignored.
#[derive(Debug, Clone, Copy)]
pub struct SwitchLogBridge {
    enabled: bool,
}

impl SwitchLogBridge {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl SwitchObserver for SwitchLogBridge {
    fn notify(&self, ctx: &RunContext, notification: &Notification) {
        let Notification::StellarTypeSwitch(event) = notification else {
            return;
        };

        if !ctx.evolving_binary_valid() {
            METRICS.inc_switches_dropped();
            trace!(object_id = event.object_id, "switch dropped: no evolving binary");
            return;
        }
        if !self.enabled {
            return;
        }

        if let Some(binary) = ctx.evolving_binary() {
            binary.print_switch_log(event, ctx);
            METRICS.inc_switches_logged();
        }
    }
}
