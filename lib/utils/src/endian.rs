//! ## Endianness Module
//! Wrappers for values stored in a fixed byte order, as found in device tree cells.
//!
//! All the types declared here implement [EndianData<T>],
//! whose [EndianData<T>::value] converts the stored value into the byte order of the current target.

///[u32] in Big Endianness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct BigEndian32(u32);

/// A packed value in memory with a specific endianness.
pub trait EndianData<T>: Copy + Clone {
    /// Parse the value into the endianness of the current architecture.
    fn value(&self) -> T;
}

/// Implement [EndianData<T>] for a big endian wrapper, plus a constructor from raw bytes.
macro_rules! impl_converter_big {
    ($type: tt, $tval: tt) => {
        impl EndianData<$tval> for $type {
            #[inline(always)]
            fn value(&self) -> $tval {
                $tval::from_be(self.0)
            }
        }
        impl $type {
            /// Wrap bytes exactly as they are laid out in memory.
            #[inline(always)]
            pub const fn from_raw_bytes(bytes: [u8; size_of::<$tval>()]) -> Self {
                Self($tval::from_ne_bytes(bytes))
            }
            /// Store a native value in big endian order.
            #[inline(always)]
            pub const fn new(value: $tval) -> Self {
                Self(value.to_be())
            }
        }
    };
}

impl_converter_big!(BigEndian32, u32);
