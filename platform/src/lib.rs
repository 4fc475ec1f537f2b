//! sunxi platform: a device/driver binding framework and the drivers bound through it.
//!
//! Hardware instances are described by a device tree, turned into platform devices by
//! [dev::bus::PlatformBus::populate] and handed to the drivers whose OF match tables
//! accept them. Everything a driver acquires while binding is scoped to the binding and
//! released when it ends.
#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod logging;

pub mod boot;
pub mod config;
pub mod dev;
pub mod drivers;
pub mod error;

#[cfg(test)]
mod testing;
