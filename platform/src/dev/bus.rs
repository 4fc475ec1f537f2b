//! The platform bus: owns every platform device and binds devices to drivers.
//!
//! Devices enter the bus through [PlatformBus::populate] (one device per enabled device tree node
//! with a `compatible` property) or [PlatformBus::add_device]. Adding a device or registering a
//! driver immediately tries to bind every matching pair.
//!
//! Binding is serialized per device by its [DeviceState]: a device is handed to at most one
//! driver at a time, and detach never overlaps attach.
use crate::{
    config::PlatformConfig,
    debug_ex,
    dev::{
        Device, DeviceInfo, DeviceState,
        driver::{Driver, DriverProbeError, DriverRegistry},
        handle::Handle,
        iomem::{IomemSpace, MmioBackend, ShadowBackend},
        of::{OfDeviceId, of_match_device},
        resource::Resource,
    },
    error::{Errno, MessageError},
};
use alloc::{
    boxed::Box,
    format,
    string::String,
    sync::Arc,
    vec,
    vec::Vec,
};
use core::fmt::{Debug, Display, Write};
use dt::{DeviceTree, Node, NodeType, PropertyError};
use lazy_static::lazy_static;
use log::warn;
use spin::RwLock;

/// Why a device could not be bound or unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// No loaded driver accepts the device.
    NoMatch,
    /// The device is bound already, or a binding is in progress.
    AlreadyBound,
    NotBound,
    /// Every matching driver failed to probe; this is the last failure.
    Probe(DriverProbeError),
}

impl BindError {
    pub fn errno(&self) -> Errno {
        match self {
            BindError::NoMatch | BindError::NotBound => Errno::ENODEV,
            BindError::AlreadyBound => Errno::EBUSY,
            BindError::Probe(err) => err.errno(),
        }
    }
}

impl MessageError for BindError {
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        match self {
            BindError::NoMatch => f.write_str("no matching driver"),
            BindError::AlreadyBound => f.write_str("device already bound"),
            BindError::NotBound => f.write_str("device not bound"),
            BindError::Probe(err) => f.write_fmt(format_args!("probe failed: {}", err)),
        }
    }
}

impl Display for BindError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}

pub struct PlatformBus {
    config: PlatformConfig,
    iomem: Arc<IomemSpace>,
    drivers: DriverRegistry,
    devices: RwLock<Vec<Handle<Device>>>,
}

impl Debug for PlatformBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlatformBus")
            .field("config", &self.config)
            .field("drivers", &self.drivers)
            .field("devices", &*self.devices.read())
            .finish()
    }
}

impl PlatformBus {
    /// A bus whose register windows are backed by host memory.
    pub fn new(config: PlatformConfig) -> PlatformBus {
        Self::with_backend(config, Box::new(ShadowBackend))
    }

    pub fn with_backend(config: PlatformConfig, backend: Box<dyn MmioBackend>) -> PlatformBus {
        PlatformBus {
            iomem: IomemSpace::new(config.iomem_window.clone(), backend),
            config,
            drivers: DriverRegistry::new(),
            devices: RwLock::new(vec![]),
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn iomem(&self) -> &Arc<IomemSpace> {
        &self.iomem
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Snapshot of the devices on the bus, in insertion order.
    pub fn devices(&self) -> Vec<Handle<Device>> {
        self.devices.read().clone()
    }

    pub fn find_device(&self, name: &str) -> Option<Handle<Device>> {
        self.devices.read().iter().find(|dev| dev.name() == name).cloned()
    }

    pub fn state_of(&self, name: &str) -> Option<DeviceState> {
        self.find_device(name).map(|dev| dev.state())
    }

    // region: devices

    /// Create platform devices for the device tree and bind them.
    ///
    /// Every enabled child of the root with a `compatible` property becomes a device; children of
    /// `simple-bus` nodes are visited as well. Nodes with malformed properties are skipped with a
    /// warning. Returns the devices created.
    pub fn populate(&self, tree: &DeviceTree) -> Vec<Handle<Device>> {
        debug_ex!("bus: populating devices from the device tree...");
        let mut added = vec![];
        self.populate_children(tree, tree.root(), &mut added);
        debug_ex!("bus: {} devices populated.", added.len());
        added
    }

    fn populate_children(&self, tree: &DeviceTree, parent: &Node, added: &mut Vec<Handle<Device>>) {
        for node in tree.get_children(parent) {
            if node.node_type == NodeType::Description || !tree.is_available(node) {
                continue;
            }
            let compatible = match tree.get_compatible(node) {
                Ok(compatible) if compatible.is_empty() => continue,
                Ok(compatible) => compatible,
                Err(err) => {
                    warn!("{}: bad 'compatible': {:?}, skipping.", tree.get_full_path(node), err);
                    continue;
                }
            };
            let info = match Self::device_info(tree, node, &compatible) {
                Ok(info) => info,
                Err(err) => {
                    warn!("{}: bad 'reg': {:?}, skipping.", tree.get_full_path(node), err);
                    continue;
                }
            };
            match self.add_device(info) {
                Ok(dev) => added.push(dev),
                Err(err) => warn!("{}: cannot add device: {}", tree.get_full_path(node), err),
            }
            if compatible.contains(&"simple-bus") {
                self.populate_children(tree, node, added);
            }
        }
    }

    /// Describe `node` as a platform device named `<first reg address>.<node name>`.
    fn device_info(tree: &DeviceTree, node: &Node, compatible: &[&str]) -> Result<DeviceInfo, PropertyError> {
        let regs = match tree.get_reg_value(node) {
            Ok(regs) => regs,
            Err(PropertyError::PropNotFound) => vec![],
            Err(err) => return Err(err),
        };
        let name = match regs.first() {
            Some(reg) => format!("{:x}.{}", reg.start, node.node_name),
            None => String::from(&*node.full_name),
        };
        let mut info = DeviceInfo::new(&name).compatible(&tree.get_full_path(node), compatible);
        for reg in regs {
            info = info.resource(Resource::mem(&node.full_name, reg));
        }
        Ok(info)
    }

    /// Put a device on the bus and try to bind it.
    ///
    /// Fails with [Errno::EEXIST] when a device of the same name exists. A device no driver accepts
    /// is still added and stays unbound.
    pub fn add_device(&self, info: DeviceInfo) -> Result<Handle<Device>, Errno> {
        let dev = Handle::from(Device::new(info, self.iomem.clone(), self.config.devres_limit));
        {
            let mut devices = self.devices.write();
            if devices.iter().any(|other| other.name() == dev.name()) {
                return Err(Errno::EEXIST);
            }
            devices.push(dev.clone());
        }
        debug_ex!("bus: added device {}.", dev.name());
        if let Err(err) = self.bind(&dev) {
            debug_ex!("bus: {} left unbound: {}", dev.name(), err);
        }
        Ok(dev)
    }

    /// Take the device called `name` off the bus, unbinding it first.
    ///
    /// Fails with [Errno::ENOENT] when no such device exists, and with [Errno::EBUSY] while the
    /// device is attaching or detaching; the device then stays on the bus.
    pub fn remove_device(&self, name: &str) -> Result<Handle<Device>, Errno> {
        let dev = {
            let mut devices = self.devices.write();
            let pos = devices
                .iter()
                .position(|dev| dev.name() == name)
                .ok_or(Errno::ENOENT)?;
            if matches!(
                devices[pos].state(),
                DeviceState::Attaching | DeviceState::Detaching
            ) {
                return Err(Errno::EBUSY);
            }
            devices.remove(pos)
        };
        if dev.is_bound() {
            // NotBound is the only failure and means a concurrent unbind won.
            self.unbind(&dev).ok();
        }
        debug_ex!("bus: removed device {}.", name);
        Ok(dev)
    }

    // endregion

    // region: drivers

    /// Load a driver and bind it to every unbound device it accepts. Returns how many devices it
    /// bound.
    pub fn register_driver(&self, driver: &'static dyn Driver) -> Result<usize, Errno> {
        self.drivers.register(driver)?;
        let mut bound = 0;
        for dev in self.devices() {
            let Some(id) = of_match_device(driver.get_match_table(), dev.compatible()) else {
                continue;
            };
            if dev.begin_attach().is_err() {
                continue;
            }
            match self.probe_with(&dev, driver, id) {
                Ok(()) => bound += 1,
                Err(_) => dev.abort_attach(),
            }
        }
        Ok(bound)
    }

    /// Unload a driver, unbinding it from its devices first. Returns how many devices it released.
    pub fn unregister_driver(&self, name: &str) -> usize {
        if self.drivers.unregister(name).is_none() {
            return 0;
        }
        self.devices()
            .iter()
            .filter(|dev| dev.driver_name() == Some(name))
            .filter(|dev| self.unbind(dev).is_ok())
            .count()
    }

    // endregion

    // region: binding

    /// Drivers that accept `dev`, most specific device compatible first, each with the match
    /// table entry it matched on.
    fn candidates(&self, dev: &Device) -> Vec<(&'static dyn Driver, &'static OfDeviceId)> {
        let mut res: Vec<(&'static dyn Driver, &'static OfDeviceId)> = vec![];
        for compat in dev.compatible() {
            for driver in self.drivers.find_drivers(compat) {
                if res.iter().any(|(drv, _)| drv.get_name() == driver.get_name()) {
                    continue;
                }
                if let Some(id) = of_match_device(driver.get_match_table(), dev.compatible()) {
                    res.push((driver, id));
                }
            }
        }
        res
    }

    /// Run one probe of a device in the `Attaching` state.
    fn probe_with(
        &self,
        dev: &Handle<Device>,
        driver: &'static dyn Driver,
        id: &'static OfDeviceId,
    ) -> Result<(), DriverProbeError> {
        debug_ex!(
            "bus: probing {} with driver '{}' ({}).",
            dev.name(),
            driver.get_name(),
            id.compatible
        );
        match driver.probe(dev, id) {
            Ok(()) => {
                dev.finish_attach(driver);
                debug_ex!("bus: driver '{}' bound to {}.", driver.get_name(), dev.name());
                Ok(())
            }
            Err(err) => {
                dev.drop_drvdata();
                match err.errno() {
                    Errno::ENODEV | Errno::ENXIO => {
                        debug_ex!("bus: driver '{}' rejects {}.", driver.get_name(), dev.name());
                    }
                    errno => {
                        dev_warn!(
                            dev,
                            "probe with driver {} failed with error {}",
                            driver.get_name(),
                            errno.to_neg()
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Bind `dev` to the first matching driver whose probe succeeds.
    ///
    /// Candidates are tried in order of the device's compatible strings; a failing probe hands the
    /// device to the next candidate. When all fail the last probe error is returned.
    pub fn bind(&self, dev: &Handle<Device>) -> Result<(), BindError> {
        dev.begin_attach().map_err(|_| BindError::AlreadyBound)?;
        let mut last_err = None;
        for (driver, id) in self.candidates(dev) {
            match self.probe_with(dev, driver, id) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        dev.abort_attach();
        Err(last_err.map_or(BindError::NoMatch, BindError::Probe))
    }

    /// End the binding of `dev`: the driver's remove hook runs, then everything the binding owns
    /// is released.
    pub fn unbind(&self, dev: &Handle<Device>) -> Result<(), BindError> {
        let driver = dev.begin_detach().map_err(|_| BindError::NotBound)?;
        if let Err(err) = driver.remove(dev) {
            dev_warn!(
                dev,
                "remove with driver {} failed with error {}, ignoring",
                driver.get_name(),
                err.errno().to_neg()
            );
        }
        dev.finish_detach();
        debug_ex!("bus: driver '{}' unbound from {}.", driver.get_name(), dev.name());
        Ok(())
    }

    // endregion
}

lazy_static! {
    /// The machine's platform bus.
    pub static ref PLATFORM_BUS: PlatformBus = PlatformBus::new(PlatformConfig::sunxi());
}
