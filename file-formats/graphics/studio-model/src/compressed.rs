//! Packed vector and quaternion encodings used by raw animation data
//!
//! All decoders are pure. Quaternion `w` is rebuilt from the other three
//! components and clamped so quantisation error never yields NaN.

use glam::{Quat, Vec3};
use half::f16;

use crate::cursor::Cursor;
use crate::error::Result;

const BITS_10: u32 = 0x3FF;
const BITS_15: u64 = 0x7FFF;
const BITS_16: u64 = 0xFFFF;
const BITS_21: u64 = 0x1F_FFFF;

/// Exponent-selected scales for [`vec32`]
const VEC32_SCALES: [f32; 4] = [4.0 / 512.0, 16.0 / 512.0, 32.0 / 512.0, 64.0 / 512.0];

const QUAT48_XY_BIAS: f32 = 32768.0;
const QUAT48_Z_BIAS: f32 = 16384.0;
const QUAT64_BIAS: f32 = 1_048_576.0;
const QUAT64_DIVISOR: f32 = 1_048_576.5;

/// Decode a 32-bit packed vector: three 10-bit fields and a 2-bit exponent
pub fn vec32(packed: u32) -> Vec3 {
    let scale = VEC32_SCALES[(packed >> 30) as usize & 0b11];
    let axis = |shift: u32| (((packed >> shift) & BITS_10) as f32 - 512.0) * scale;
    Vec3::new(axis(0), axis(10), axis(20))
}

/// Decode three consecutive IEEE half floats
pub fn vec48(bytes: [u8; 6]) -> Vec3 {
    let half = |i: usize| f16::from_le_bytes([bytes[i], bytes[i + 1]]).to_f32();
    Vec3::new(half(0), half(2), half(4))
}

/// Decode a 48-bit packed quaternion
pub fn quat48(bytes: [u8; 6]) -> Quat {
    let mut wide = [0u8; 8];
    wide[..6].copy_from_slice(&bytes);
    let v = u64::from_le_bytes(wide);

    let x = ((v & BITS_16) as f32 - QUAT48_XY_BIAS) / QUAT48_XY_BIAS;
    let y = (((v >> 16) & BITS_16) as f32 - QUAT48_XY_BIAS) / QUAT48_XY_BIAS;
    let z = (((v >> 32) & BITS_15) as f32 - QUAT48_Z_BIAS) / QUAT48_Z_BIAS;
    with_rebuilt_w(x, y, z, v & (1 << 47) != 0)
}

/// Decode a 64-bit packed quaternion
pub fn quat64(bytes: [u8; 8]) -> Quat {
    let v = u64::from_le_bytes(bytes);
    let field = |shift: u32| (((v >> shift) & BITS_21) as f32 - QUAT64_BIAS) / QUAT64_DIVISOR;
    with_rebuilt_w(field(0), field(21), field(42), v & (1 << 63) != 0)
}

fn with_rebuilt_w(x: f32, y: f32, z: f32, negative: bool) -> Quat {
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    Quat::from_xyzw(x, y, z, if negative { -w } else { w })
}

impl Cursor<'_> {
    pub fn read_vec32(&mut self) -> Result<Vec3> {
        Ok(vec32(self.read_u32()?))
    }

    pub fn read_vec48(&mut self) -> Result<Vec3> {
        Ok(vec48(self.read_bytes()?))
    }

    pub fn read_quat48(&mut self) -> Result<Quat> {
        Ok(quat48(self.read_bytes()?))
    }

    pub fn read_quat64(&mut self) -> Result<Quat> {
        Ok(quat64(self.read_bytes()?))
    }
}
