//! Loadable driver modules.
//!
//! A driver module pairs a [Driver] with the metadata a loader shows for it. Use
//! [crate::module_platform_driver] to declare one; loading registers the driver with a bus,
//! unloading unbinds it from every device and unregisters it.
use crate::{
    dev::{
        bus::{PLATFORM_BUS, PlatformBus},
        driver::Driver,
        of::of_table_iter,
    },
    error::Errno,
};
use alloc::{format, string::String, vec::Vec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub authors: &'static [&'static str],
    pub license: &'static str,
}

#[derive(Debug)]
pub struct PlatformDriverModule {
    pub info: ModuleInfo,
    pub driver: &'static dyn Driver,
}

impl PlatformDriverModule {
    /// Register the driver with `bus`. Returns how many devices it bound right away.
    pub fn init(&self, bus: &PlatformBus) -> Result<usize, Errno> {
        debug_ex!("module {}: init.", self.info.name);
        bus.register_driver(self.driver)
    }

    /// Unbind and unregister the driver. Returns how many devices it released.
    pub fn exit(&self, bus: &PlatformBus) -> usize {
        debug_ex!("module {}: exit.", self.info.name);
        bus.unregister_driver(self.driver.get_name())
    }

    /// [PlatformDriverModule::init] on the machine's bus.
    pub fn load(&self) -> Result<usize, Errno> {
        self.init(&PLATFORM_BUS)
    }

    /// [PlatformDriverModule::exit] on the machine's bus.
    pub fn unload(&self) -> usize {
        self.exit(&PLATFORM_BUS)
    }

    /// Autoload aliases, two per match table entry: `of:N*T*C<compatible>` and
    /// `of:N*T*C<compatible>C*`.
    pub fn aliases(&self) -> Vec<String> {
        of_table_iter(self.driver.get_match_table())
            .flat_map(|id| {
                [
                    format!("of:N*T*C{}", id.compatible),
                    format!("of:N*T*C{}C*", id.compatible),
                ]
            })
            .collect()
    }
}

/// Declare `MODULE`, a [PlatformDriverModule] for a driver value.
///
/// ```ignore
/// module_platform_driver! {
///     driver: MyDriver,
///     name: "my-driver",
///     authors: ["Jane Doe <jane@example.org>"],
///     description: "My device driver",
///     license: "GPL v2",
/// }
/// ```
#[macro_export]
macro_rules! module_platform_driver {
    (
        driver: $driver:expr,
        name: $name:expr,
        authors: [$($author:expr),* $(,)?],
        description: $description:expr,
        license: $license:expr $(,)?
    ) => {
        pub static MODULE: $crate::dev::module::PlatformDriverModule =
            $crate::dev::module::PlatformDriverModule {
                info: $crate::dev::module::ModuleInfo {
                    name: $name,
                    description: $description,
                    authors: &[$($author),*],
                    license: $license,
                },
                driver: &$driver,
            };
    };
}
