use glam::Vec3;

use crate::chunks::animation::AnimDescFlags;
use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

pub const SEQ_DESC: RecordLayout = RecordLayout::new("sequence", 212);
pub const EVENT: RecordLayout = RecordLayout::new("event", 80);

const SEQ_DESC_RESERVED: usize = 20;
const EVENT_OPTIONS_LEN: usize = 64;
const SEQ: &str = "sequence";

/// An animation event fired at a point in a sequence
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Event {
    /// Playback cycle in `0.0..=1.0`
    pub cycle: f32,
    pub event: i32,
    pub kind: i32,
    pub options: String,
    pub name: String,
}

impl Event {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let cycle = cursor.read_f32()?;
        let event = cursor.read_i32()?;
        let kind = cursor.read_i32()?;
        let options = cursor.read_fixed_string(EVENT_OPTIONS_LEN)?;
        let name_index = cursor.read_i32()?;
        let name = cursor.read_string_rel(start, name_index, "event", "name")?;
        Ok(Self {
            cycle,
            event,
            kind,
            options,
            name,
        })
    }
}

/// A playable sequence blending one or more animations
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct SeqDesc {
    pub label: String,
    pub activity_name: String,
    pub flags: AnimDescFlags,
    pub activity: i32,
    pub activity_weight: i32,
    pub events: Vec<Event>,
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    pub blend_count: i32,
    /// Blend grid dimensions
    pub group_size: [u32; 2],
    /// Anim desc index per grid cell, row-major by the second dimension
    pub anim_indices: Vec<u16>,
    pub movement_index: i32,
    pub param_index: [i32; 2],
    pub param_start: [f32; 2],
    pub param_end: [f32; 2],
    pub param_parent: i32,
    pub fade_in_time: f32,
    pub fade_out_time: f32,
    pub entry_node: i32,
    pub exit_node: i32,
    pub node_flags: i32,
    pub entry_phase: f32,
    pub exit_phase: f32,
    pub last_frame: f32,
    pub next_sequence: i32,
    pub pose: i32,
    pub ik_rule_count: i32,
    pub auto_layer_count: i32,
    /// Per-bone blend weights, one per bone
    pub weights: Vec<f32>,
    pub ik_lock_count: i32,
    pub key_values: String,
    pub cycle_pose_index: i32,
    pub activity_modifier_count: i32,
}

impl SeqDesc {
    pub fn parse(cursor: &mut Cursor<'_>, bone_count: usize, anim_count: usize) -> Result<Self> {
        let start = cursor.position();
        let _base_ptr = cursor.read_i32()?;
        let label_index = cursor.read_i32()?;
        let activity_name_index = cursor.read_i32()?;
        let flags = AnimDescFlags::from_bits_retain(cursor.read_u32()?);
        let activity = cursor.read_i32()?;
        let activity_weight = cursor.read_i32()?;
        let events = cursor.read_table_ref(SEQ, "events")?;
        let bb_min = cursor.read_vec3()?;
        let bb_max = cursor.read_vec3()?;
        let blend_count = cursor.read_i32()?;
        let anim_index_index = cursor.read_i32()?;
        let movement_index = cursor.read_i32()?;
        let group_size_at = cursor.position();
        let raw_group_size = [cursor.read_i32()?, cursor.read_i32()?];
        let param_index = [cursor.read_i32()?, cursor.read_i32()?];
        let param_start = [cursor.read_f32()?, cursor.read_f32()?];
        let param_end = [cursor.read_f32()?, cursor.read_f32()?];
        let param_parent = cursor.read_i32()?;
        let fade_in_time = cursor.read_f32()?;
        let fade_out_time = cursor.read_f32()?;
        let entry_node = cursor.read_i32()?;
        let exit_node = cursor.read_i32()?;
        let node_flags = cursor.read_i32()?;
        let entry_phase = cursor.read_f32()?;
        let exit_phase = cursor.read_f32()?;
        let last_frame = cursor.read_f32()?;
        let next_sequence = cursor.read_i32()?;
        let pose = cursor.read_i32()?;
        let ik_rule_count = cursor.read_i32()?;
        let auto_layer_count = cursor.read_i32()?;
        let _auto_layer_index = cursor.read_i32()?;
        let weight_list_at = cursor.position();
        let weight_list_index = cursor.read_i32()?;
        let _pose_key_index = cursor.read_i32()?;
        let ik_lock_count = cursor.read_i32()?;
        let _ik_lock_index = cursor.read_i32()?;
        let key_value_index = cursor.read_i32()?;
        let key_value_size = cursor.read_i32()?;
        let cycle_pose_index = cursor.read_i32()?;
        let _activity_modifier_index = cursor.read_i32()?;
        let activity_modifier_count = cursor.read_i32()?;
        cursor.skip(SEQ_DESC_RESERVED)?;

        let label = cursor.read_string_rel(start, label_index, SEQ, "label")?;
        let activity_name =
            cursor.read_string_rel(start, activity_name_index, SEQ, "activity_name")?;
        let key_values =
            cursor.read_text_rel(start, key_value_index, key_value_size, SEQ, "key_values")?;

        let origin = OffsetOrigin::Start(start);
        let events = cursor.read_table(&events, origin, EVENT, |c, _| Event::parse(c))?;

        let group_size = [
            cursor.checked_count(SEQ, "group_size", raw_group_size[0], group_size_at)? as u32,
            cursor.checked_count(SEQ, "group_size", raw_group_size[1], group_size_at + 4)? as u32,
        ];
        let cells = group_size[0]
            .checked_mul(group_size[1])
            .filter(|&n| n <= cursor.limits().max_table_count)
            .ok_or(StudioError::LimitExceeded {
                structure: SEQ,
                field: "group_size",
                value: group_size[0] as u64 * group_size[1] as u64,
                limit: cursor.limits().max_table_count as u64,
            })?;
        let grid = TableRef::new(
            SEQ,
            "anim_indices",
            cells as i32,
            anim_index_index,
            group_size_at,
        );
        let anim_indices = cursor.read_table(
            &grid,
            origin,
            RecordLayout::new("blend cell", 2),
            |c, _| {
                let index = c.read_i16()?;
                if index < 0 || index as usize >= anim_count {
                    return Err(StudioError::InvalidReference {
                        structure: SEQ,
                        field: "anim_indices",
                        value: index as i64,
                        max: anim_count as i64 - 1,
                    });
                }
                Ok(index as u16)
            },
        )?;

        let weights = if weight_list_index == 0 {
            Vec::new()
        } else {
            let table = TableRef::new(
                SEQ,
                "weights",
                bone_count as i32,
                weight_list_index,
                weight_list_at,
            );
            cursor.read_table(&table, origin, RecordLayout::new("bone weight", 4), |c, _| {
                c.read_f32()
            })?
        };

        Ok(Self {
            label,
            activity_name,
            flags,
            activity,
            activity_weight,
            events,
            bb_min,
            bb_max,
            blend_count,
            group_size,
            anim_indices,
            movement_index,
            param_index,
            param_start,
            param_end,
            param_parent,
            fade_in_time,
            fade_out_time,
            entry_node,
            exit_node,
            node_flags,
            entry_phase,
            exit_phase,
            last_frame,
            next_sequence,
            pose,
            ik_rule_count,
            auto_layer_count,
            weights,
            ik_lock_count,
            key_values,
            cycle_pose_index,
            activity_modifier_count,
        })
    }

    /// Anim desc index at a blend grid cell
    pub fn anim_at(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.group_size[0] || y >= self.group_size[1] {
            return None;
        }
        self.anim_indices
            .get((y * self.group_size[0] + x) as usize)
            .map(|&i| i as usize)
    }

    pub fn is_looping(&self) -> bool {
        self.flags.contains(AnimDescFlags::LOOPING)
    }
}
