//! Drivers built into the platform.

pub mod media;

use crate::dev::{bus::PlatformBus, module::PlatformDriverModule};
use log::warn;

/// Every built-in driver module, in registration order.
pub static BUILTIN_MODULES: &[&PlatformDriverModule] = &[&media::sun4i_csi1::MODULE];

/// Register the built-in drivers with `bus`. Returns how many devices they bound.
pub fn register_drivers(bus: &PlatformBus) -> usize {
    debug_ex!("Registering drivers...");
    let mut bound = 0;
    for module in BUILTIN_MODULES {
        match module.init(bus) {
            Ok(count) => bound += count,
            Err(err) => warn!("module {}: init failed: {}", module.info.name, err),
        }
    }
    debug_ex!("Drivers registered.");
    bound
}
