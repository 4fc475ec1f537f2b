use crate::{
    dev::{
        devres::{Devres, DevmBox, DevmUninit},
        driver::Driver,
        iomem::{IoMem, IomemSpace},
        resource::{Resource, ResourceFlags, get_resource},
    },
    error::Errno,
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{any::Any, fmt::Debug};
use spin::Mutex;

/// Binding state of a device.
///
/// `Unbound -> Attaching -> Bound -> Detaching -> Unbound`; a failed probe goes from
/// `Attaching` straight back to `Unbound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unbound,
    Attaching,
    Bound,
    Detaching,
}

/// The device tree node a device was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfNode {
    pub path: Box<str>,
    /// Most specific first.
    pub compatible: Vec<Box<str>>,
}

/// Everything needed to create a [Device].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: Box<str>,
    pub of_node: Option<OfNode>,
    pub resources: Vec<Resource>,
}

impl DeviceInfo {
    pub fn new(name: &str) -> DeviceInfo {
        DeviceInfo {
            name: Box::from(name),
            of_node: None,
            resources: Vec::new(),
        }
    }

    pub fn compatible(mut self, path: &str, compatible: &[&str]) -> DeviceInfo {
        self.of_node = Some(OfNode {
            path: Box::from(path),
            compatible: compatible.iter().map(|c| Box::from(*c)).collect(),
        });
        self
    }

    pub fn resource(mut self, resource: Resource) -> DeviceInfo {
        self.resources.push(resource);
        self
    }
}

type DriverData = Arc<dyn Any + Send + Sync>;

/// A platform device: one hardware instance known to the bus.
pub struct Device {
    name: Box<str>,
    of_node: Option<OfNode>,
    resources: Vec<Resource>,
    state: Mutex<DeviceState>,
    driver: Mutex<Option<&'static dyn Driver>>,
    drvdata: Mutex<Option<DriverData>>,
    devres: Arc<Devres>,
    iomem: Arc<IomemSpace>,
}

impl Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("of_node", &self.of_node)
            .field("resources", &self.resources)
            .field("state", &self.state())
            .field("driver", &self.driver_name())
            .finish()
    }
}

impl Device {
    pub(crate) fn new(info: DeviceInfo, iomem: Arc<IomemSpace>, devres_limit: usize) -> Device {
        Device {
            name: info.name,
            of_node: info.of_node,
            resources: info.resources,
            state: Mutex::new(DeviceState::Unbound),
            driver: Mutex::new(None),
            drvdata: Mutex::new(None),
            devres: Devres::new(devres_limit),
            iomem,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn of_node(&self) -> Option<&OfNode> {
        self.of_node.as_ref()
    }

    /// Compatible strings of the device, empty for devices not described by a device tree.
    pub fn compatible(&self) -> &[Box<str>] {
        self.of_node
            .as_ref()
            .map(|node| node.compatible.as_slice())
            .unwrap_or(&[])
    }

    pub fn of_path(&self) -> Option<&str> {
        self.of_node.as_ref().map(|node| &*node.path)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// The `index`-th resource of kind `kind`.
    pub fn get_resource(&self, kind: ResourceFlags, index: usize) -> Option<&Resource> {
        get_resource(&self.resources, kind, index)
    }

    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    pub fn is_bound(&self) -> bool {
        self.state() == DeviceState::Bound
    }

    pub fn driver_name(&self) -> Option<&'static str> {
        self.driver.lock().map(|driver| driver.get_name())
    }

    // region: driver data

    /// Publish the driver's per-device context. The device owns it until the binding ends.
    pub fn set_drvdata<T: Any + Send + Sync>(&self, data: DevmBox<T>) {
        *self.drvdata.lock() = Some(Arc::new(data));
    }

    /// Run `f` on the published context if it is a `T`.
    ///
    /// No lock is held while `f` runs, so `f` may call back into this device. A context replaced
    /// or dropped by an unbind meanwhile stays alive until `f` returns.
    pub fn with_drvdata<T: Any + Send + Sync, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.drvdata.lock().clone()?;
        let data = data.downcast_ref::<DevmBox<T>>()?;
        Some(f(data))
    }

    pub fn has_drvdata(&self) -> bool {
        self.drvdata.lock().is_some()
    }

    // endregion

    // region: device-managed resources

    /// Reserve storage for a `T` charged to this device. Fails with [Errno::ENOMEM] when the
    /// device's budget is exhausted.
    pub fn devm_alloc<T>(&self) -> Result<DevmUninit<T>, Errno> {
        Ok(DevmUninit::new(self.devres.charge()?))
    }

    /// Claim and map a memory resource on behalf of this device.
    ///
    /// The claim is named after the device. Errors: [Errno::EINVAL] for a non-memory or invalid
    /// range, [Errno::EBUSY] when the range is claimed already, [Errno::ENOMEM] when the device's
    /// budget is exhausted, or whatever the mapping backend reports.
    pub fn devm_ioremap_resource(&self, resource: &Resource) -> Result<IoMem, Errno> {
        if !resource.is_kind(ResourceFlags::MEM) {
            return Err(Errno::EINVAL);
        }
        let charge = self.devres.charge()?;
        let claim = self.iomem.request_region(resource.range.clone(), &self.name)?;
        Ok(self.iomem.ioremap(claim)?.charged(charge))
    }

    /// Number of live device-managed objects.
    pub fn devres_in_use(&self) -> usize {
        self.devres.in_use()
    }

    // endregion

    // region: binding state, driven by the bus

    pub(crate) fn begin_attach(&self) -> Result<(), DeviceState> {
        let mut state = self.state.lock();
        if *state != DeviceState::Unbound {
            return Err(*state);
        }
        *state = DeviceState::Attaching;
        Ok(())
    }

    pub(crate) fn finish_attach(&self, driver: &'static dyn Driver) {
        *self.driver.lock() = Some(driver);
        *self.state.lock() = DeviceState::Bound;
    }

    /// Drop whatever a failed probe left published.
    pub(crate) fn drop_drvdata(&self) {
        let data = self.drvdata.lock().take();
        drop(data);
    }

    /// Give up attaching: the device goes back to `Unbound` without driver data.
    pub(crate) fn abort_attach(&self) {
        self.drop_drvdata();
        *self.state.lock() = DeviceState::Unbound;
    }

    pub(crate) fn begin_detach(&self) -> Result<&'static dyn Driver, DeviceState> {
        let mut state = self.state.lock();
        let driver = match (*state, *self.driver.lock()) {
            (DeviceState::Bound, Some(driver)) => driver,
            (other, _) => return Err(other),
        };
        *state = DeviceState::Detaching;
        Ok(driver)
    }

    /// End the binding: the context and everything it owns are dropped.
    pub(crate) fn finish_detach(&self) {
        self.drop_drvdata();
        *self.driver.lock() = None;
        *self.state.lock() = DeviceState::Unbound;
    }

    // endregion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::iomem::ShadowBackend;

    fn device(limit: usize) -> Device {
        let iomem = IomemSpace::new(0..usize::MAX, Box::new(ShadowBackend));
        let info = DeviceInfo::new("1c09000.csi")
            .compatible("/soc/csi@1c09000", &["allwinner,sun4i-a10-csi1"])
            .resource(Resource::irq("csi", 42))
            .resource(Resource::mem("csi", 0x01c0_9000..0x01c0_a000));
        Device::new(info, iomem, limit)
    }

    #[derive(Debug)]
    struct Context(u32);

    #[test]
    fn drvdata_is_typed_and_lent() {
        let dev = device(4);
        assert!(!dev.has_drvdata());
        let ctx = dev.devm_alloc::<Context>().unwrap().write(Context(5));
        dev.set_drvdata(ctx);
        assert_eq!(dev.with_drvdata(|ctx: &Context| ctx.0), Some(5));
        assert_eq!(dev.with_drvdata(|_: &u32| ()), None);
        assert_eq!(dev.devres_in_use(), 1);
    }

    #[test]
    fn drvdata_callback_may_reenter_the_device() {
        let dev = device(4);
        dev.set_drvdata(dev.devm_alloc::<Context>().unwrap().write(Context(5)));
        let seen = dev.with_drvdata(|outer: &Context| {
            assert!(dev.has_drvdata());
            let inner = dev.with_drvdata(|inner: &Context| inner.0);
            dev.set_drvdata(dev.devm_alloc::<Context>().unwrap().write(Context(6)));
            (outer.0, inner)
        });
        assert_eq!(seen, Some((5, Some(5))));
        assert_eq!(dev.with_drvdata(|ctx: &Context| ctx.0), Some(6));
        assert_eq!(dev.devres_in_use(), 1);
    }

    #[test]
    fn ioremap_requires_a_memory_resource() {
        let dev = device(4);
        let irq = dev.get_resource(ResourceFlags::IRQ, 0).unwrap().clone();
        assert_eq!(dev.devm_ioremap_resource(&irq).unwrap_err(), Errno::EINVAL);
        let mem = dev.get_resource(ResourceFlags::MEM, 0).unwrap().clone();
        let mmio = dev.devm_ioremap_resource(&mem).unwrap();
        assert_eq!(mmio.phys(), &(0x01c0_9000..0x01c0_a000));
        assert_eq!(dev.devres_in_use(), 1);
        assert_eq!(dev.devm_ioremap_resource(&mem).unwrap_err(), Errno::EBUSY);
        assert_eq!(dev.devres_in_use(), 1);
        drop(mmio);
        assert_eq!(dev.devres_in_use(), 0);
    }

    #[test]
    fn budget_limits_devm_objects() {
        let dev = device(1);
        let slot = dev.devm_alloc::<Context>().unwrap();
        assert_eq!(dev.devm_alloc::<Context>().err(), Some(Errno::ENOMEM));
        drop(slot);
        assert!(dev.devm_alloc::<Context>().is_ok());
    }

    #[test]
    fn state_transitions() {
        let dev = device(4);
        assert_eq!(dev.state(), DeviceState::Unbound);
        dev.begin_attach().unwrap();
        assert_eq!(dev.begin_attach(), Err(DeviceState::Attaching));
        dev.set_drvdata(dev.devm_alloc::<Context>().unwrap().write(Context(1)));
        dev.abort_attach();
        assert_eq!(dev.state(), DeviceState::Unbound);
        assert!(!dev.has_drvdata());
        assert_eq!(dev.devres_in_use(), 0);
        assert_eq!(dev.begin_detach().unwrap_err(), DeviceState::Unbound);
    }
}
