//! Video capture and camera interface drivers.

pub mod sun4i_csi1;
