use dt::{DeviceTree, DeviceTreeBuilder};
use log::LevelFilter;
use std::{cell::RefCell, sync::Once};
use sunxi_platform::{
    config::PlatformConfig,
    dev::{
        DeviceState,
        bus::{BindError, PLATFORM_BUS, PlatformBus},
        driver::DriverProbeError,
        resource::ResourceFlags,
    },
    drivers::{
        self,
        media::sun4i_csi1::{self, MODULE, with_csi},
    },
    logging::{self, Console},
};

thread_local! {
    static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct Capture;

impl Console for Capture {
    fn write_line(&self, line: &str) {
        LINES.with(|lines| lines.borrow_mut().push(line.to_string()));
    }
}

static CAPTURE: Capture = Capture;

fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| logging::init(&CAPTURE, LevelFilter::Trace).unwrap());
    take_logs();
}

fn take_logs() -> Vec<String> {
    LINES.with(|lines| lines.borrow_mut().drain(..).collect())
}

fn infos(lines: &[String]) -> Vec<&String> {
    lines.iter().filter(|line| line.contains("[INFO]")).collect()
}

/// An A10 board with the CSI1 block at 0x01c09000 and a second, optional one at 0x01c1d000.
fn board(second_status: &str) -> DeviceTree {
    let mut b = DeviceTreeBuilder::new();
    let root = b.root();
    b.prop_strlist(root, "compatible", &["allwinner,sun4i-a10"])
        .prop_u32(root, "#address-cells", 1)
        .prop_u32(root, "#size-cells", 1);
    let chosen = b.node(root, "chosen");
    b.prop_str(chosen, "stdout-path", "serial0:115200n8");
    let soc = b.node(root, "soc");
    b.prop_strlist(soc, "compatible", &["simple-bus"])
        .prop_u32(soc, "#address-cells", 1)
        .prop_u32(soc, "#size-cells", 1);
    let csi = b.node(soc, "csi@1c09000");
    b.prop_strlist(csi, "compatible", &["allwinner,sun4i-a10-csi1"])
        .prop_cells(csi, "reg", &[0x01c0_9000, 0x1000]);
    let second = b.node(soc, "csi@1c1d000");
    b.prop_strlist(second, "compatible", &["allwinner,sun7i-a20-csi1", "allwinner,sun4i-a10-csi1"])
        .prop_cells(second, "reg", &[0x01c1_d000, 0x1000])
        .prop_str(second, "status", second_status);
    b.build()
}

#[test]
fn csi1_attach_and_detach() {
    capture_logs();
    let bus = PlatformBus::new(PlatformConfig::sunxi());
    bus.populate(&board("disabled"));
    assert!(bus.find_device("1c1d000.csi").is_none());
    take_logs();

    assert_eq!(drivers::register_drivers(&bus), 1);
    let dev = bus.find_device("1c09000.csi").unwrap();
    assert_eq!(dev.state(), DeviceState::Bound);
    assert_eq!(dev.of_path(), Some("/soc/csi@1c09000"));
    let base = with_csi(&dev, |csi| csi.mmio().addr()).unwrap();
    assert_ne!(base, 0);
    let lines = take_logs();
    assert_eq!(infos(&lines).len(), 1);
    assert!(infos(&lines)[0].contains("1c09000.csi: sun4i_csi1_probe();"));

    let removed = bus.remove_device("1c09000.csi").unwrap();
    assert_eq!(removed.state(), DeviceState::Unbound);
    assert!(with_csi(&removed, |_| ()).is_none());
    assert!(!bus.iomem().is_claimed(0x01c0_9000));
    assert_eq!(removed.devres_in_use(), 0);
    let lines = take_logs();
    assert_eq!(infos(&lines).len(), 1);
    assert!(infos(&lines)[0].contains("1c09000.csi: sun4i_csi1_remove();"));
}

#[test]
fn populating_after_the_driver_binds_every_instance() {
    let bus = PlatformBus::new(PlatformConfig::sunxi());
    assert_eq!(MODULE.init(&bus), Ok(0));
    let added = bus.populate(&board("okay"));
    assert_eq!(added.len(), 3);

    let first = bus.find_device("1c09000.csi").unwrap();
    let second = bus.find_device("1c1d000.csi").unwrap();
    assert!(first.is_bound() && second.is_bound());
    assert_eq!(bus.state_of("soc"), Some(DeviceState::Unbound));

    let phys = |name: &str| {
        let dev = bus.find_device(name).unwrap();
        with_csi(&dev, |csi| csi.mmio().phys().clone()).unwrap()
    };
    assert_eq!(phys("1c09000.csi"), 0x01c0_9000..0x01c0_a000);
    assert_eq!(phys("1c1d000.csi"), 0x01c1_d000..0x01c1_e000);
    assert_eq!(bus.iomem().claims().len(), 2);
    assert_eq!(&*bus.iomem().claims()[1].name, "1c1d000.csi");

    assert_eq!(MODULE.exit(&bus), 2);
    assert!(!first.is_bound() && !second.is_bound());
    assert!(bus.iomem().claims().is_empty());
}

#[test]
fn node_without_registers_is_left_unbound() {
    let mut b = DeviceTreeBuilder::new();
    let root = b.root();
    let csi = b.node(root, "csi");
    b.prop_strlist(csi, "compatible", &["allwinner,sun7i-a20-csi1"]);
    let bus = PlatformBus::new(PlatformConfig::sunxi());
    MODULE.init(&bus).unwrap();
    bus.populate(&b.build());

    let dev = bus.find_device("csi").unwrap();
    assert_eq!(dev.state(), DeviceState::Unbound);
    assert!(with_csi(&dev, |_| ()).is_none());
    assert_eq!(
        bus.bind(&dev),
        Err(BindError::Probe(DriverProbeError::ResourceNotFound {
            kind: ResourceFlags::MEM,
            index: 0,
        }))
    );
    assert_eq!(bus.bind(&dev).unwrap_err().errno().to_neg(), -22);
}

#[test]
fn module_loads_onto_the_machine_bus() {
    assert_eq!(MODULE.load(), Ok(0));
    assert!(PLATFORM_BUS.drivers().get(sun4i_csi1::MODULE_NAME).is_some());
    assert!(MODULE.load().is_err());
    assert_eq!(MODULE.unload(), 0);
    assert!(PLATFORM_BUS.drivers().get(sun4i_csi1::MODULE_NAME).is_none());
}
