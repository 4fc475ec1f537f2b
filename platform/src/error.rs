//! Commonly used error types and the traits to report them

use core::fmt::{Debug, Display, Write};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// An error that can be printed to a string device
pub trait MessageError: Debug {
    /// Print the error message to a writer
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        f.write_fmt(format_args!("{:?}", self))
    }
}

impl Display for dyn MessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}

/// Kernel error numbers, as reported to and by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    EIO = 5,
    ENXIO = 6,
    ENOMEM = 12,
    EBUSY = 16,
    EEXIST = 17,
    ENODEV = 19,
    EINVAL = 22,
    ENOSPC = 28,
}

impl Errno {
    /// The negative code returned by kernel entry points.
    pub fn to_neg(self) -> i32 {
        -i32::from(self)
    }

    /// Decode a code in either sign convention.
    pub fn from_code(code: i32) -> Option<Errno> {
        Errno::try_from(code.checked_abs()?).ok()
    }
}

impl MessageError for Errno {
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        f.write_fmt(format_args!("{:?} ({})", self, self.to_neg()))
    }
}

impl Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}
