use crate::common::{Matrix3x4, RecordLayout};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

pub const ATTACHMENT: RecordLayout = RecordLayout::new("attachment", 92);
pub const POSE_PARAMETER: RecordLayout = RecordLayout::new("pose parameter", 20);

const ATTACHMENT_RESERVED: usize = 32;

/// A named point attached to a bone
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Attachment {
    pub name: String,
    pub flags: u32,
    pub bone: usize,
    /// Transform relative to the bone
    pub local: Matrix3x4,
}

impl Attachment {
    pub fn parse(cursor: &mut Cursor<'_>, bone_count: usize) -> Result<Self> {
        let start = cursor.position();
        let name_index = cursor.read_i32()?;
        let flags = cursor.read_u32()?;
        let bone = cursor.read_i32()?;
        let local = cursor.read_matrix3x4()?;
        cursor.skip(ATTACHMENT_RESERVED)?;

        if bone < 0 || bone as usize >= bone_count {
            return Err(StudioError::InvalidReference {
                structure: "attachment",
                field: "bone",
                value: bone as i64,
                max: bone_count as i64 - 1,
            });
        }

        Ok(Self {
            name: cursor.read_string_rel(start, name_index, "attachment", "name")?,
            flags,
            bone: bone as usize,
            local,
        })
    }
}

/// A named blend parameter driving sequence blend grids
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct PoseParameter {
    pub name: String,
    pub flags: i32,
    pub start: f32,
    pub end: f32,
    /// Wrap range for looping parameters, zero when not looping
    pub loop_range: f32,
}

impl PoseParameter {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start_pos = cursor.position();
        let name_index = cursor.read_i32()?;
        let flags = cursor.read_i32()?;
        let start = cursor.read_f32()?;
        let end = cursor.read_f32()?;
        let loop_range = cursor.read_f32()?;
        Ok(Self {
            name: cursor.read_string_rel(start_pos, name_index, "pose parameter", "name")?,
            flags,
            start,
            end,
            loop_range,
        })
    }

    /// Map a value in `start..=end` to `0.0..=1.0`
    pub fn normalize(&self, value: f32) -> f32 {
        if self.end == self.start {
            return 0.0;
        }
        ((value - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }
}
