//! Device-managed resources.
//!
//! Every object a driver acquires through its device while binding ([DevmBox], [crate::dev::iomem::IoMem])
//! holds one unit of the device's [Devres] budget. The unit is returned when the object is dropped,
//! which happens on the early-return path of a failing probe or when the binding ends and the bus
//! drops the driver data. A device that is not bound therefore always has [Devres::in_use] == 0.
use crate::error::Errno;
use alloc::{boxed::Box, sync::Arc};
use core::{
    fmt::Debug,
    mem::MaybeUninit,
    ops::Deref,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Budget of live device-managed objects of one device.
#[derive(Debug)]
pub struct Devres {
    limit: usize,
    in_use: AtomicUsize,
}

impl Devres {
    pub fn new(limit: usize) -> Arc<Devres> {
        Arc::new(Devres {
            limit,
            in_use: AtomicUsize::new(0),
        })
    }

    /// Take one unit of the budget. Fails with [Errno::ENOMEM] once the limit is reached.
    pub fn charge(self: &Arc<Self>) -> Result<DevresCharge, Errno> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .map_err(|_| Errno::ENOMEM)?;
        Ok(DevresCharge {
            devres: self.clone(),
        })
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

/// One unit of a [Devres] budget, returned on drop.
#[derive(Debug)]
pub struct DevresCharge {
    devres: Arc<Devres>,
}

impl Drop for DevresCharge {
    fn drop(&mut self) {
        self.devres.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Storage reserved for a `T` whose fields are not known yet.
pub struct DevmUninit<T> {
    slot: Box<MaybeUninit<T>>,
    charge: DevresCharge,
}

impl<T> DevmUninit<T> {
    pub fn new(charge: DevresCharge) -> DevmUninit<T> {
        DevmUninit {
            slot: Box::new_uninit(),
            charge,
        }
    }

    /// Initialize the reserved storage.
    pub fn write(self, value: T) -> DevmBox<T> {
        let DevmUninit { mut slot, charge } = self;
        slot.write(value);
        DevmBox {
            // SAFETY: the slot was fully initialized just above.
            inner: unsafe { slot.assume_init() },
            _charge: charge,
        }
    }
}

/// A heap object charged to its device. Fields drop before the charge is returned.
pub struct DevmBox<T> {
    inner: Box<T>,
    _charge: DevresCharge,
}

impl<T> Deref for DevmBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Debug> Debug for DevmBox<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.inner.fmt(f)
    }
}
