//! Driver subsystem: the [Driver] trait, probe errors and the registry of loaded drivers.
//!
//! Responsibilities:
//! - Provide the [Driver] trait for platform drivers.
//! - Keep a [DriverRegistry] that maps compatible strings to driver implementations so the bus
//!   can discover candidates for a device.
//!
//! Ownership and concurrency notes:
//! - Drivers are `&'static` values; the registry only stores references.
//! - The registry is protected by an [RwLock] for reader-heavy access. Lookups return owned
//!   vectors so no lock is held while a driver probes.
use crate::{
    debug_ex,
    dev::{Device, handle::Handle, of::OfDeviceId, of::of_table_iter, resource::ResourceFlags},
    error::{Errno, MessageError},
};
use alloc::{collections::btree_map::BTreeMap, string::String, vec::Vec};
use core::fmt::{Debug, Display, Write};
use spin::RwLock;

/// Trait implemented by drivers.
///
/// - [Driver::get_match_table] lists the compatible strings the driver accepts, closed by
///   [OfDeviceId::SENTINEL].
/// - [Driver::probe] binds the driver to a device. On success the driver has published its
///   per-device context with [Device::set_drvdata]; on failure everything it acquired has been
///   released by the time the error is returned.
/// - [Driver::remove] runs when the binding ends, before the bus drops the context.
///
/// Implementations must be `Sync` and have `'static` lifetime when registered.
pub trait Driver: Sync + Debug {
    fn get_name(&self) -> &'static str;
    fn get_match_table(&self) -> &'static [OfDeviceId];
    fn probe(&self, dev: &Handle<Device>, id: &'static OfDeviceId) -> Result<(), DriverProbeError>;
    fn remove(&self, dev: &Handle<Device>) -> Result<(), DriverProbeError>;
    fn on_registered(&self) {}
}

// region: Error Types

/// Errors that may be returned by [Driver::probe].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverProbeError {
    /// The device description lacks a resource the driver needs.
    ResourceNotFound { kind: ResourceFlags, index: usize },
    /// The register window could not be claimed or mapped.
    MappingFailed(Errno),
    /// A device-managed allocation was refused.
    AllocationFailed,
}

impl DriverProbeError {
    /// The error number reported to the bus.
    pub fn errno(&self) -> Errno {
        match self {
            DriverProbeError::ResourceNotFound { .. } => Errno::EINVAL,
            DriverProbeError::MappingFailed(errno) => *errno,
            DriverProbeError::AllocationFailed => Errno::ENOMEM,
        }
    }
}

impl MessageError for DriverProbeError {
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        match self {
            DriverProbeError::ResourceNotFound { kind, index } => {
                f.write_fmt(format_args!("no {:?} resource #{}", kind, index))
            }
            DriverProbeError::MappingFailed(errno) => {
                f.write_fmt(format_args!("cannot map registers: {}", errno))
            }
            DriverProbeError::AllocationFailed => f.write_str("out of device memory"),
        }
    }
}

impl Display for DriverProbeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}

// endregion

#[derive(Default)]
struct RegistryInner {
    /// Registration order.
    drivers: Vec<&'static dyn Driver>,
    /// Lower-cased compatible string -> candidate drivers.
    comp_map: BTreeMap<String, Vec<&'static dyn Driver>>,
}

/// Loaded drivers, looked up by name or compatible string.
#[derive(Default)]
pub struct DriverRegistry {
    inner: RwLock<RegistryInner>,
}

impl Debug for DriverRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.inner.read().drivers.iter().map(|drv| drv.get_name()))
            .finish()
    }
}

impl DriverRegistry {
    pub fn new() -> DriverRegistry {
        DriverRegistry::default()
    }

    /// Register a driver.
    ///
    /// Fails with [Errno::EEXIST] when a driver of the same name is loaded. On success
    /// [Driver::on_registered] has run and the driver is findable under every compatible string
    /// of its match table.
    pub fn register(&self, driver: &'static dyn Driver) -> Result<(), Errno> {
        let mut guard = self.inner.write();
        if guard.drivers.iter().any(|drv| drv.get_name() == driver.get_name()) {
            return Err(Errno::EEXIST);
        }
        driver.on_registered();
        guard.drivers.push(driver);
        for id in of_table_iter(driver.get_match_table()) {
            guard
                .comp_map
                .entry(id.compatible.to_ascii_lowercase())
                .or_default()
                .push(driver);
        }
        debug_ex!("\tRegistered driver '{}'.", driver.get_name());
        Ok(())
    }

    /// Remove the driver called `name`, returning it if it was loaded.
    pub fn unregister(&self, name: &str) -> Option<&'static dyn Driver> {
        let mut guard = self.inner.write();
        let pos = guard.drivers.iter().position(|drv| drv.get_name() == name)?;
        let driver = guard.drivers.remove(pos);
        guard.comp_map.retain(|_, drivers| {
            drivers.retain(|drv| drv.get_name() != name);
            !drivers.is_empty()
        });
        debug_ex!("\tUnregistered driver '{}'.", name);
        Some(driver)
    }

    /// Drivers accepting `compatible`, in registration order.
    pub fn find_drivers(&self, compatible: &str) -> Vec<&'static dyn Driver> {
        self.inner
            .read()
            .comp_map
            .get(&compatible.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&'static dyn Driver> {
        self.inner
            .read()
            .drivers
            .iter()
            .find(|drv| drv.get_name() == name)
            .copied()
    }

    pub fn drivers(&self) -> Vec<&'static dyn Driver> {
        self.inner.read().drivers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[derive(Debug)]
    struct Dummy(&'static str, &'static [OfDeviceId]);

    impl Driver for Dummy {
        fn get_name(&self) -> &'static str {
            self.0
        }

        fn get_match_table(&self) -> &'static [OfDeviceId] {
            self.1
        }

        fn probe(&self, _dev: &Handle<Device>, _id: &'static OfDeviceId) -> Result<(), DriverProbeError> {
            Ok(())
        }

        fn remove(&self, _dev: &Handle<Device>) -> Result<(), DriverProbeError> {
            Ok(())
        }
    }

    static TABLE_A: [OfDeviceId; 3] = [
        OfDeviceId::new("vendor,uart"),
        OfDeviceId::new("vendor,Serial"),
        OfDeviceId::SENTINEL,
    ];
    static TABLE_B: [OfDeviceId; 2] = [OfDeviceId::new("vendor,uart"), OfDeviceId::SENTINEL];
    static DRV_A: Dummy = Dummy("a", &TABLE_A);
    static DRV_B: Dummy = Dummy("b", &TABLE_B);
    static DRV_A_AGAIN: Dummy = Dummy("a", &TABLE_B);

    fn names(drivers: &[&'static dyn Driver]) -> Vec<&'static str> {
        drivers.iter().map(|drv| drv.get_name()).collect()
    }

    #[test]
    fn lookup_by_compatible_keeps_registration_order() {
        let reg = DriverRegistry::new();
        reg.register(&DRV_A).unwrap();
        reg.register(&DRV_B).unwrap();
        assert_eq!(names(&reg.find_drivers("vendor,uart")), ["a", "b"]);
        assert_eq!(names(&reg.find_drivers("VENDOR,serial")), ["a"]);
        assert!(reg.find_drivers("vendor,nothing").is_empty());
    }

    #[test]
    fn duplicate_names_are_refused() {
        let reg = DriverRegistry::new();
        reg.register(&DRV_A).unwrap();
        assert_eq!(reg.register(&DRV_A_AGAIN), Err(Errno::EEXIST));
        assert_eq!(reg.drivers().len(), 1);
    }

    #[test]
    fn unregister_forgets_every_compatible() {
        let reg = DriverRegistry::new();
        reg.register(&DRV_A).unwrap();
        reg.register(&DRV_B).unwrap();
        assert!(reg.unregister("a").is_some());
        assert!(reg.unregister("a").is_none());
        assert!(reg.find_drivers("vendor,serial").is_empty());
        assert_eq!(names(&reg.find_drivers("vendor,uart")), ["b"]);
        assert!(reg.get("a").is_none());
    }

    #[test]
    fn errors_map_to_errno() {
        let missing = DriverProbeError::ResourceNotFound {
            kind: ResourceFlags::MEM,
            index: 0,
        };
        assert_eq!(missing.errno(), Errno::EINVAL);
        assert_eq!(DriverProbeError::AllocationFailed.errno(), Errno::ENOMEM);
        assert_eq!(DriverProbeError::MappingFailed(Errno::EBUSY).errno(), Errno::EBUSY);
        assert_eq!(missing.to_string(), "no MEM resource #0");
        assert_eq!(
            DriverProbeError::MappingFailed(Errno::EBUSY).to_string(),
            "cannot map registers: EBUSY (-16)"
        );
        assert_eq!(DriverProbeError::AllocationFailed.to_string(), "out of device memory");
    }
}
