//! Device model: devices, drivers and the bus that binds them.

pub mod bus;
pub mod devres;
pub mod driver;
pub mod handle;
pub mod iomem;
pub mod module;
pub mod of;
pub mod resource;

mod device;

pub use device::*;
