//! Allwinner A10/A20 CMOS Sensor Interface 1.
//!
//! Binds to the CSI1 block, maps its register window and keeps both in a per-device
//! [Sun4iCsi1] context for as long as the device stays bound.
use crate::{
    dev::{
        Device,
        driver::{Driver, DriverProbeError},
        handle::{Handle, HandleRef},
        iomem::IoMem,
        of::OfDeviceId,
        resource::ResourceFlags,
    },
    module_platform_driver,
};

pub const MODULE_NAME: &str = "sun4i-csi1";

pub static SUN4I_CSI1_OF_MATCH: [OfDeviceId; 3] = [
    OfDeviceId::new("allwinner,sun4i-a10-csi1"),
    OfDeviceId::new("allwinner,sun7i-a20-csi1"),
    OfDeviceId::SENTINEL,
];

/// State of one bound CSI1 instance.
#[derive(Debug)]
pub struct Sun4iCsi1 {
    dev: HandleRef<Device>,
    mmio: IoMem,
}

impl Sun4iCsi1 {
    /// The device this context belongs to, while it is still alive.
    pub fn device(&self) -> Option<Handle<Device>> {
        self.dev.get_handle()
    }

    pub fn mmio(&self) -> &IoMem {
        &self.mmio
    }
}

/// Run `f` on the context of a bound CSI1 device.
pub fn with_csi<R>(dev: &Device, f: impl FnOnce(&Sun4iCsi1) -> R) -> Option<R> {
    dev.with_drvdata(f)
}

#[derive(Debug)]
pub struct Sun4iCsi1Driver;

impl Sun4iCsi1Driver {
    fn resources_get(dev: &Handle<Device>) -> Result<IoMem, DriverProbeError> {
        let Some(res) = dev.get_resource(ResourceFlags::MEM, 0) else {
            dev_err!(dev, "sun4i_csi1_resources_get(): platform_get_resource() failed.");
            return Err(DriverProbeError::ResourceNotFound {
                kind: ResourceFlags::MEM,
                index: 0,
            });
        };
        dev.devm_ioremap_resource(res).map_err(|errno| {
            dev_err!(
                dev,
                "sun4i_csi1_resources_get(): devm_ioremap_resource() failed: {}.",
                errno.to_neg()
            );
            DriverProbeError::MappingFailed(errno)
        })
    }
}

impl Driver for Sun4iCsi1Driver {
    fn get_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn get_match_table(&self) -> &'static [OfDeviceId] {
        &SUN4I_CSI1_OF_MATCH
    }

    fn probe(&self, dev: &Handle<Device>, _id: &'static OfDeviceId) -> Result<(), DriverProbeError> {
        dev_info!(dev, "sun4i_csi1_probe();");

        let csi = dev
            .devm_alloc::<Sun4iCsi1>()
            .map_err(|_| DriverProbeError::AllocationFailed)?;
        let mmio = Self::resources_get(dev)?;
        let csi = csi.write(Sun4iCsi1 {
            dev: dev.create_ref(),
            mmio,
        });

        dev_dbg!(dev, "sun4i_csi1_probe(): registers mapped at {:?}.", csi.mmio());
        dev.set_drvdata(csi);
        Ok(())
    }

    fn remove(&self, dev: &Handle<Device>) -> Result<(), DriverProbeError> {
        dev_info!(dev, "sun4i_csi1_remove();");
        Ok(())
    }
}

module_platform_driver! {
    driver: Sun4iCsi1Driver,
    name: MODULE_NAME,
    authors: ["Luc Verhaegen <libv@skynet.be>"],
    description: "Allwinner A10/A20 CMOS Sensor Interface 1 V4L2 driver",
    license: "GPL v2",
}
