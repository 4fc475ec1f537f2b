//! Physical register windows: exclusive claims and their mappings.
//!
//! [IomemSpace] owns the table of claimed physical ranges. A driver first claims a range
//! ([IomemSpace::request_region]) and then maps the claim ([IomemSpace::ioremap]). Both steps
//! return ownership types: dropping an [IoMem] unmaps the window and then releases the claim.
use crate::{
    config::PAGE_SIZE,
    dev::{
        devres::DevresCharge,
        resource::{Resource, ResourceFlags},
    },
    error::Errno,
};
use alloc::{
    alloc::{Layout, alloc_zeroed, dealloc},
    boxed::Box,
    collections::btree_map::BTreeMap,
    sync::Arc,
    vec::Vec,
};
use core::{
    fmt::Debug,
    ops::Range,
    ptr::{NonNull, read_volatile, write_volatile},
};
use spin::Mutex;
use utils::range::RangeExt;

/// How physical ranges become addressable.
pub trait MmioBackend: Send + Sync {
    /// Map `phys` and return the base address of the mapping.
    fn map(&self, phys: &Range<usize>) -> Result<NonNull<u8>, Errno>;

    /// Tear down a mapping.
    ///
    /// # Safety
    /// `base` must have been returned by [MmioBackend::map] for `phys` and must not be used afterwards.
    unsafe fn unmap(&self, base: NonNull<u8>, phys: &Range<usize>);
}

/// Backs every mapping with zeroed, page aligned host memory.
///
/// Used where no real bus is reachable: the driver sees a register file that reads back what it wrote.
#[derive(Debug, Default)]
pub struct ShadowBackend;

impl ShadowBackend {
    fn layout(phys: &Range<usize>) -> Result<Layout, Errno> {
        Layout::from_size_align(phys.len(), PAGE_SIZE).map_err(|_| Errno::EINVAL)
    }
}

impl MmioBackend for ShadowBackend {
    fn map(&self, phys: &Range<usize>) -> Result<NonNull<u8>, Errno> {
        if phys.is_empty() {
            return Err(Errno::EINVAL);
        }
        let layout = Self::layout(phys)?;
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(Errno::ENOMEM)
    }

    unsafe fn unmap(&self, base: NonNull<u8>, phys: &Range<usize>) {
        if let Ok(layout) = Self::layout(phys) {
            // SAFETY: `base` came from `map` with the same layout.
            unsafe { dealloc(base.as_ptr(), layout) };
        }
    }
}

/// Physical address space of a platform.
pub struct IomemSpace {
    window: Range<usize>,
    /// start -> (end, owner); claims never overlap.
    claims: Mutex<BTreeMap<usize, (usize, Box<str>)>>,
    backend: Box<dyn MmioBackend>,
}

impl Debug for IomemSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IomemSpace")
            .field("window", &self.window)
            .field("claims", &self.claims())
            .finish()
    }
}

impl IomemSpace {
    pub fn new(window: Range<usize>, backend: Box<dyn MmioBackend>) -> Arc<IomemSpace> {
        Arc::new(IomemSpace {
            window,
            claims: Mutex::new(BTreeMap::new()),
            backend,
        })
    }

    /// Claim `range` exclusively for `owner`.
    ///
    /// Fails with [Errno::EINVAL] for an empty range or one outside the window, and with
    /// [Errno::EBUSY] when any part of it is already claimed.
    pub fn request_region(self: &Arc<Self>, range: Range<usize>, owner: &str) -> Result<RegionClaim, Errno> {
        if range.is_empty() || !self.window.contains_range(&range) {
            return Err(Errno::EINVAL);
        }
        let mut claims = self.claims.lock();
        let busy = claims
            .range(..range.end)
            .next_back()
            .is_some_and(|(start, (end, _))| (*start..*end).overlap(&range));
        if busy {
            return Err(Errno::EBUSY);
        }
        claims.insert(range.start, (range.end, Box::from(owner)));
        Ok(RegionClaim {
            space: self.clone(),
            range,
        })
    }

    /// Map a claimed range. Backend failures are returned unchanged.
    pub fn ioremap(&self, claim: RegionClaim) -> Result<IoMem, Errno> {
        let base = self.backend.map(&claim.range)?;
        Ok(IoMem {
            base,
            claim,
            _charge: None,
        })
    }

    /// Whether `addr` lies inside a claimed range.
    pub fn is_claimed(&self, addr: usize) -> bool {
        self.claims
            .lock()
            .range(..=addr)
            .next_back()
            .is_some_and(|(_, (end, _))| addr < *end)
    }

    /// Snapshot of the claimed ranges, named after their owners.
    pub fn claims(&self) -> Vec<Resource> {
        self.claims
            .lock()
            .iter()
            .map(|(start, (end, owner))| Resource {
                name: owner.clone(),
                range: *start..*end,
                flags: ResourceFlags::MEM | ResourceFlags::BUSY,
            })
            .collect()
    }

    fn release(&self, range: &Range<usize>) {
        self.claims.lock().remove(&range.start);
    }
}

/// Exclusive claim on a physical range, released on drop.
pub struct RegionClaim {
    space: Arc<IomemSpace>,
    range: Range<usize>,
}

impl RegionClaim {
    pub fn range(&self) -> &Range<usize> {
        &self.range
    }
}

impl Debug for RegionClaim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("RegionClaim[{:#x},{:#x})", self.range.start, self.range.end))
    }
}

impl Drop for RegionClaim {
    fn drop(&mut self) {
        self.space.release(&self.range);
    }
}

/// A mapped register window. The base is never null while the value exists.
pub struct IoMem {
    base: NonNull<u8>,
    claim: RegionClaim,
    _charge: Option<DevresCharge>,
}

// SAFETY: the mapping is owned exclusively by this value and all accesses are volatile.
unsafe impl Send for IoMem {}
// SAFETY: as above; `&IoMem` only allows bounds checked volatile accesses.
unsafe impl Sync for IoMem {}

impl IoMem {
    pub(crate) fn charged(mut self, charge: DevresCharge) -> IoMem {
        self._charge = Some(charge);
        self
    }

    pub fn addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn phys(&self) -> &Range<usize> {
        self.claim.range()
    }

    pub fn len(&self) -> usize {
        self.claim.range().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reg_ptr(&self, offset: usize) -> Result<*mut u32, Errno> {
        let in_bounds = offset
            .checked_add(size_of::<u32>())
            .is_some_and(|end| end <= self.len());
        if !in_bounds || offset % size_of::<u32>() != 0 {
            return Err(Errno::EINVAL);
        }
        // SAFETY: offset + 4 <= len, so the pointer stays inside the mapping.
        Ok(unsafe { self.base.as_ptr().add(offset) } as *mut u32)
    }

    /// Read the 32-bit register at `offset`.
    pub fn read32(&self, offset: usize) -> Result<u32, Errno> {
        let ptr = self.reg_ptr(offset)?;
        // SAFETY: `ptr` is aligned and inside the live mapping.
        Ok(unsafe { read_volatile(ptr) })
    }

    /// Write the 32-bit register at `offset`.
    pub fn write32(&self, offset: usize, value: u32) -> Result<(), Errno> {
        let ptr = self.reg_ptr(offset)?;
        // SAFETY: `ptr` is aligned and inside the live mapping.
        unsafe { write_volatile(ptr, value) };
        Ok(())
    }
}

impl Debug for IoMem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "IoMem[{:#x},{:#x}) @ {:p}",
            self.phys().start,
            self.phys().end,
            self.base
        ))
    }
}

impl Drop for IoMem {
    fn drop(&mut self) {
        // SAFETY: `base` was produced by this backend for this range and is not used again.
        unsafe { self.claim.space.backend.unmap(self.base, &self.claim.range) };
    }
}
