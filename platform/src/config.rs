use core::ops::Range;
use log::LevelFilter;

pub const PAGE_SIZE: usize = 0x1000; // 4KiB

/// Device-managed objects a single device may hold at once.
pub const DEFAULT_DEVRES_LIMIT: usize = 64;

/// Peripheral block of the A10/A20 SoCs.
pub const SUNXI_IO_WINDOW: Range<usize> = 0x01c0_0000..0x0200_0000;

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Knobs of a [crate::dev::bus::PlatformBus].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Physical addresses that may be claimed and mapped.
    pub iomem_window: Range<usize>,
    /// Per-device limit of live device-managed objects.
    pub devres_limit: usize,
    pub log_level: LevelFilter,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            iomem_window: 0..usize::MAX,
            devres_limit: DEFAULT_DEVRES_LIMIT,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

impl PlatformConfig {
    /// Configuration for Allwinner A10/A20 boards.
    pub fn sunxi() -> Self {
        PlatformConfig {
            iomem_window: SUNXI_IO_WINDOW,
            ..Self::default()
        }
    }

    pub fn with_devres_limit(mut self, limit: usize) -> Self {
        self.devres_limit = limit;
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}
