#![no_std]

#[cfg(test)]
extern crate std;

pub mod endian;
pub mod range;
