//! Animation sampling
//!
//! Record decoding lives in [`crate::chunks::animation`]; this module turns
//! decoded records into bone poses.

pub mod pose;

pub use pose::{BonePose, euler_to_quat};
