use bitflags::bitflags;
use glam::{Quat, Vec3};

use crate::chunks::anim_value::AnimValueTrack;
use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

pub const ANIM_DESC: RecordLayout = RecordLayout::new("anim desc", 100);
pub const MOVEMENT: RecordLayout = RecordLayout::new("movement", 44);
pub const ANIM_SECTION: RecordLayout = RecordLayout::new("anim section", 8);
pub const ANIM_BLOCK: RecordLayout = RecordLayout::new("anim block", 8);

const ANIM_DESC_RESERVED: usize = 24;
const QUAT48_SIZE: u64 = 6;
const QUAT64_SIZE: u64 = 8;

/// Bone index that ends an anim record chain
pub const ANIM_TERMINATOR: u8 = 255;

bitflags! {
    /// Encoding flags of a per-bone anim record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct AnimFlags: u8 {
        /// Position stored as three half floats
        const RAW_POS = 0x01;
        /// Rotation stored as a 48-bit packed quaternion
        const RAW_ROT = 0x02;
        /// Position stored as value chains
        const ANIM_POS = 0x04;
        /// Rotation stored as value chains of Euler angles
        const ANIM_ROT = 0x08;
        /// Values are relative to identity rather than the rest pose
        const DELTA = 0x10;
        /// Rotation stored as a 64-bit packed quaternion
        const RAW_ROT2 = 0x20;
    }
}

impl AnimFlags {
    pub fn is_raw(self) -> bool {
        self.intersects(Self::RAW_POS | Self::RAW_ROT | Self::RAW_ROT2)
    }
}

bitflags! {
    /// Flags shared by animation descriptions and sequences
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct AnimDescFlags: u32 {
        const LOOPING = 0x0001;
        const SNAP = 0x0002;
        const DELTA = 0x0004;
        const AUTOPLAY = 0x0008;
        const POST = 0x0010;
        /// No local animation data at all
        const ALL_ZEROS = 0x0020;
        const CYCLE_POSE = 0x0080;
        const REALTIME = 0x0100;
        const LOCAL = 0x0200;
        const HIDDEN = 0x0400;
        const OVERRIDE = 0x0800;
        const ACTIVITY = 0x1000;
        const EVENT = 0x2000;
        const WORLD = 0x4000;
    }
}

/// Rotation payload of an anim record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub enum AnimRotation {
    Raw(Quat),
    /// Euler angle chains, scaled by the bone's rotation scale
    Keyed(AnimValueTrack),
}

/// Position payload of an anim record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub enum AnimPosition {
    Raw(Vec3),
    /// Position chains, scaled by the bone's position scale
    Keyed(AnimValueTrack),
}

/// Animation data for one bone in one section
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Anim {
    pub bone: u8,
    pub flags: AnimFlags,
    pub rotation: Option<AnimRotation>,
    pub position: Option<AnimPosition>,
}

impl Anim {
    /// Whether either channel is stored as value chains
    pub fn is_keyed(&self) -> bool {
        matches!(self.rotation, Some(AnimRotation::Keyed(_)))
            || matches!(self.position, Some(AnimPosition::Keyed(_)))
    }

    /// Read the payload of a record whose 4-byte header was already consumed
    fn parse_payload(
        cursor: &mut Cursor<'_>,
        bone: u8,
        flags: AnimFlags,
        frame_count: u32,
    ) -> Result<Self> {
        let payload = cursor.position();

        let (rotation, position) = if flags.is_raw() {
            let rotation = if flags.contains(AnimFlags::RAW_ROT2) {
                Some(AnimRotation::Raw(cursor.read_quat64()?))
            } else if flags.contains(AnimFlags::RAW_ROT) {
                Some(AnimRotation::Raw(cursor.read_quat48()?))
            } else {
                None
            };
            let position = if flags.contains(AnimFlags::RAW_POS) {
                let mut skip = 0;
                if flags.contains(AnimFlags::RAW_ROT) {
                    skip += QUAT48_SIZE;
                }
                if flags.contains(AnimFlags::RAW_ROT2) {
                    skip += QUAT64_SIZE;
                }
                cursor.seek(payload + skip)?;
                Some(AnimPosition::Raw(cursor.read_vec48()?))
            } else {
                None
            };
            (rotation, position)
        } else {
            let rotation = if flags.contains(AnimFlags::ANIM_ROT) {
                Some(AnimRotation::Keyed(AnimValueTrack::parse(
                    cursor,
                    frame_count,
                )?))
            } else {
                None
            };
            let position = if flags.contains(AnimFlags::ANIM_POS) {
                Some(AnimPosition::Keyed(AnimValueTrack::parse(
                    cursor,
                    frame_count,
                )?))
            } else {
                None
            };
            (rotation, position)
        };

        Ok(Self {
            bone,
            flags,
            rotation,
            position,
        })
    }
}

/// Read the chain of anim records starting at `start`.
///
/// The chain ends at a terminator record or a zero `next` link; terminators
/// are not returned.
pub fn read_anim_chain(
    cursor: &mut Cursor<'_>,
    start: u64,
    frame_count: u32,
    bone_count: usize,
) -> Result<Vec<Anim>> {
    let mark = cursor.mark();
    let result = walk_anim_chain(cursor, start, frame_count, bone_count);
    cursor.restore(mark);
    result.map_err(|e| e.within("anim"))
}

fn walk_anim_chain(
    cursor: &mut Cursor<'_>,
    start: u64,
    frame_count: u32,
    bone_count: usize,
) -> Result<Vec<Anim>> {
    let limit = cursor.limits().max_anim_records;
    let mut anims = Vec::new();
    let mut record = start;

    loop {
        cursor.seek(record)?;
        let bone = cursor.read_u8()?;
        let flags = AnimFlags::from_bits_retain(cursor.read_u8()?);
        let next = cursor.read_i16()?;
        if bone == ANIM_TERMINATOR {
            break;
        }
        if anims.len() as u32 >= limit {
            return Err(StudioError::LimitExceeded {
                structure: "anim",
                field: "records",
                value: anims.len() as u64 + 1,
                limit: limit as u64,
            });
        }
        if bone as usize >= bone_count {
            return Err(StudioError::InvalidReference {
                structure: "anim",
                field: "bone",
                value: bone as i64,
                max: bone_count as i64 - 1,
            });
        }

        log::trace!("anim record at {record:#x}: bone {bone} flags {flags:?} next {next}");
        anims.push(Anim::parse_payload(cursor, bone, flags, frame_count)?);

        if next == 0 {
            break;
        }
        record = cursor.resolve(record, next as i64, "anim", "next")?;
    }

    Ok(anims)
}

/// One section slot of an animation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimSection {
    /// Animation block holding the data; zero means this file
    pub anim_block: i32,
    /// Offset of the data, relative to the anim desc for local data or to the
    /// block start for streamed data
    pub anim_offset: i32,
    /// Frames this slot was decoded for
    pub frame_count: u32,
    /// Decoded records, `None` when the data lives in a streamed block
    pub anims: Option<Vec<Anim>>,
}

impl AnimSection {
    pub fn is_local(&self) -> bool {
        self.anim_block == 0
    }
}

/// A root motion segment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Movement {
    pub end_frame: i32,
    pub motion_flags: i32,
    pub v0: f32,
    pub v1: f32,
    pub angle: f32,
    pub vector: Vec3,
    pub position: Vec3,
}

impl Movement {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            end_frame: cursor.read_i32()?,
            motion_flags: cursor.read_i32()?,
            v0: cursor.read_f32()?,
            v1: cursor.read_f32()?,
            angle: cursor.read_f32()?,
            vector: cursor.read_vec3()?,
            position: cursor.read_vec3()?,
        })
    }
}

/// Byte range of one animation block inside the external block file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimBlock {
    pub start: i32,
    pub end: i32,
}

impl AnimBlock {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            start: cursor.read_i32()?,
            end: cursor.read_i32()?,
        })
    }
}

/// An animation clip
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimDesc {
    pub name: String,
    pub fps: f32,
    pub flags: AnimDescFlags,
    pub frame_count: u32,
    pub movements: Vec<Movement>,
    pub anim_block: i32,
    pub anim_index: i32,
    pub ik_rule_count: i32,
    pub local_hierarchy_count: i32,
    /// Frames per section, zero when the clip is not sectioned
    pub section_frames: u32,
    pub zero_frame_span: i16,
    pub zero_frame_count: i16,
    pub zero_frame_index: i32,
    pub zero_frame_stall_time: f32,
    pub sections: Vec<AnimSection>,
}

impl AnimDesc {
    pub fn parse(cursor: &mut Cursor<'_>, bone_count: usize) -> Result<Self> {
        let start = cursor.position();
        let _base_ptr = cursor.read_i32()?;
        let name_index = cursor.read_i32()?;
        let fps = cursor.read_f32()?;
        let flags = AnimDescFlags::from_bits_retain(cursor.read_u32()?);
        let frames_at = cursor.position();
        let raw_frames = cursor.read_i32()?;
        let movements = cursor.read_table_ref("anim desc", "movements")?;
        cursor.skip(ANIM_DESC_RESERVED)?;
        let anim_block = cursor.read_i32()?;
        let anim_index = cursor.read_i32()?;
        let ik_rule_count = cursor.read_i32()?;
        let _ik_rule_index = cursor.read_i32()?;
        let _anim_block_ik_rule_index = cursor.read_i32()?;
        let local_hierarchy_count = cursor.read_i32()?;
        let _local_hierarchy_index = cursor.read_i32()?;
        let section_index_at = cursor.position();
        let section_index = cursor.read_i32()?;
        let raw_section_frames = cursor.read_i32()?;
        let zero_frame_span = cursor.read_i16()?;
        let zero_frame_count = cursor.read_i16()?;
        let zero_frame_index = cursor.read_i32()?;
        let zero_frame_stall_time = cursor.read_f32()?;

        let name = cursor.read_string_rel(start, name_index, "anim desc", "name")?;
        let frame_count = checked_frames(cursor, "frame_count", raw_frames, frames_at)?;
        let section_frames = checked_frames(
            cursor,
            "section_frames",
            raw_section_frames,
            section_index_at + 4,
        )?;

        let movements =
            cursor.read_table(&movements, OffsetOrigin::Start(start), MOVEMENT, |c, _| {
                Movement::parse(c)
            })?;

        let sections = if flags.contains(AnimDescFlags::ALL_ZEROS) {
            Vec::new()
        } else if section_frames == 0 {
            vec![read_section(
                cursor,
                start,
                anim_block,
                anim_index,
                frame_count,
                bone_count,
            )?]
        } else {
            let count = frame_count / section_frames + 2;
            let table = TableRef::new(
                "anim desc",
                "sections",
                count as i32,
                section_index,
                section_index_at,
            );
            let slots = cursor.read_table(&table, OffsetOrigin::Start(start), ANIM_SECTION, |c, _| {
                Ok((c.read_i32()?, c.read_i32()?))
            })?;
            slots
                .into_iter()
                .enumerate()
                .map(|(i, (block, index))| {
                    let frames = if i as u32 == count - 1 {
                        frame_count - (count - 2) * section_frames
                    } else {
                        section_frames
                    };
                    read_section(cursor, start, block, index, frames, bone_count)
                })
                .collect::<Result<Vec<_>>>()?
        };

        log::trace!(
            "anim desc '{}': {} frames at {} fps, {} sections",
            name,
            frame_count,
            fps,
            sections.len()
        );

        Ok(Self {
            name,
            fps,
            flags,
            frame_count,
            movements,
            anim_block,
            anim_index,
            ik_rule_count,
            local_hierarchy_count,
            section_frames,
            zero_frame_span,
            zero_frame_count,
            zero_frame_index,
            zero_frame_stall_time,
            sections,
        })
    }

    /// Whether any section slot is left for a streamed block
    pub fn has_external_sections(&self) -> bool {
        self.sections.iter().any(|s| !s.is_local())
    }
}

fn checked_frames(cursor: &Cursor<'_>, field: &'static str, raw: i32, at: u64) -> Result<u32> {
    if raw < 0 {
        return Err(StudioError::InvalidCount {
            structure: "anim desc",
            field,
            count: raw as i64,
            offset: at,
        });
    }
    let limit = cursor.limits().max_frame_count;
    if raw as u32 > limit {
        return Err(StudioError::LimitExceeded {
            structure: "anim desc",
            field,
            value: raw as u64,
            limit: limit as u64,
        });
    }
    Ok(raw as u32)
}

fn read_section(
    cursor: &mut Cursor<'_>,
    desc_start: u64,
    anim_block: i32,
    anim_offset: i32,
    frame_count: u32,
    bone_count: usize,
) -> Result<AnimSection> {
    let anims = if anim_block == 0 {
        let start = cursor.resolve(desc_start, anim_offset as i64, "anim desc", "anim_index")?;
        Some(read_anim_chain(cursor, start, frame_count, bone_count)?)
    } else {
        None
    };
    Ok(AnimSection {
        anim_block,
        anim_offset,
        frame_count,
        anims,
    })
}
