//! Resources a hardware description grants to a device.

use alloc::boxed::Box;
use bitflags::bitflags;
use core::{fmt::Debug, ops::Range};

bitflags! {
    /// Resource kinds, numbered like the kernel's `IORESOURCE_*` bits.
    pub struct ResourceFlags: u32 {
        /// Port I/O range
        const IO    = 0x0000_0100;
        /// Memory-mapped register window
        const MEM   = 0x0000_0200;
        /// Interrupt line
        const IRQ   = 0x0000_0400;
        /// The range has been claimed by a driver
        const BUSY  = 0x8000_0000;
    }
}

impl ResourceFlags {
    const TYPE_MASK: ResourceFlags = Self::IO.union(Self::MEM).union(Self::IRQ);

    /// The kind bits without state bits such as [ResourceFlags::BUSY].
    pub fn kind(&self) -> ResourceFlags {
        *self & Self::TYPE_MASK
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: Box<str>,
    pub range: Range<usize>,
    pub flags: ResourceFlags,
}

impl Resource {
    pub fn mem(name: &str, range: Range<usize>) -> Resource {
        Resource {
            name: Box::from(name),
            range,
            flags: ResourceFlags::MEM,
        }
    }

    pub fn irq(name: &str, irq: usize) -> Resource {
        Resource {
            name: Box::from(name),
            range: irq..irq + 1,
            flags: ResourceFlags::IRQ,
        }
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn is_kind(&self, kind: ResourceFlags) -> bool {
        self.flags.kind() == kind
    }
}

impl Debug for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "{} [{:#x},{:#x}) {:?}",
            self.name, self.range.start, self.range.end, self.flags
        ))
    }
}

/// Return the `index`-th resource of kind `kind`, skipping resources of other kinds.
pub fn get_resource(resources: &[Resource], kind: ResourceFlags, index: usize) -> Option<&Resource> {
    resources.iter().filter(|res| res.is_kind(kind)).nth(index)
}
