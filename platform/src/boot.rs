//! Platform bring-up on the machine's bus.

use crate::{
    dev::bus::PLATFORM_BUS,
    drivers,
    logging::{self, Console},
};
use dt::DeviceTree;
use log::{SetLoggerError, info};

/// Install logging, create the devices described by `tree` and load the built-in drivers.
///
/// Returns how many devices ended up bound. Fails when a logger is installed already, before any
/// device is created.
pub fn boot(console: &'static dyn Console, tree: &DeviceTree) -> Result<usize, SetLoggerError> {
    logging::init(console, PLATFORM_BUS.config().log_level)?;
    info!("Booting sunxi platform...");
    let devices = PLATFORM_BUS.populate(tree).len();
    let bound = drivers::register_drivers(&PLATFORM_BUS);
    info!("{} devices, {} bound.", devices, bound);
    Ok(bound)
}
