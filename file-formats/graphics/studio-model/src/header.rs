use bitflags::bitflags;
use glam::Vec3;

use crate::common::TableRef;
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};
use crate::version::MdlVersion;

/// Magic signature for MDL files ("IDST")
pub const MDL_MAGIC: [u8; 4] = *b"IDST";

/// Bytes of the MDL header that are decoded
pub const MDL_HEADER_SIZE: usize = 380;

const NAME_LEN: usize = 64;

/// File positions of the skin table dimensions, which are not stored as a pair
pub(crate) const SKIN_REFERENCE_COUNT_AT: u64 = 220;
pub(crate) const SKIN_FAMILY_COUNT_AT: u64 = 224;
const HEADER: &str = "mdl header";

bitflags! {
    /// Model-wide flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct MdlFlags: u32 {
        const AUTOGENERATED_HITBOX = 1 << 0;
        const USES_ENV_CUBEMAP = 1 << 1;
        const FORCE_OPAQUE = 1 << 2;
        const TRANSLUCENT_TWOPASS = 1 << 3;
        const STATIC_PROP = 1 << 4;
        const USES_FB_TEXTURE = 1 << 5;
        const HAS_SHADOW_LOD = 1 << 6;
        const USES_BUMPMAPPING = 1 << 7;
        const USE_SHADOWLOD_MATERIALS = 1 << 8;
        const OBSOLETE = 1 << 9;
        const UNUSED = 1 << 10;
        const NO_FORCED_FADE = 1 << 11;
        const FORCE_PHONEME_CROSSFADE = 1 << 12;
        const CONSTANT_DIRECTIONAL_LIGHT_DOT = 1 << 13;
        const FLEXES_CONVERTED = 1 << 14;
        const BUILT_IN_PREVIEW_MODE = 1 << 15;
        const AMBIENT_BOOST = 1 << 16;
        const DO_NOT_CAST_SHADOWS = 1 << 17;
        const CAST_TEXTURE_SHADOWS = 1 << 18;
    }
}

/// Check a four-byte magic at the cursor
pub(crate) fn read_magic(cursor: &mut Cursor<'_>, expected: [u8; 4]) -> Result<()> {
    let magic: [u8; 4] = cursor.read_bytes().map_err(|e| e.within(HEADER))?;
    if magic != expected {
        return Err(StudioError::InvalidMagic {
            expected: String::from_utf8_lossy(&expected).to_string(),
            actual: String::from_utf8_lossy(&magic).to_string(),
        });
    }
    Ok(())
}

/// The MDL file header.
///
/// Tables are kept as raw descriptors; every offset in them is measured from
/// the start of the file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct MdlHeader {
    pub version: MdlVersion,
    pub checksum: i32,
    pub name: String,
    /// Total file length as recorded by the compiler
    pub data_length: i32,

    pub eye_position: Vec3,
    pub illum_position: Vec3,
    pub hull_min: Vec3,
    pub hull_max: Vec3,
    pub view_bb_min: Vec3,
    pub view_bb_max: Vec3,

    pub flags: MdlFlags,

    pub bones: TableRef,
    pub bone_controllers: TableRef,
    pub hitbox_sets: TableRef,
    pub local_anims: TableRef,
    pub local_seqs: TableRef,
    pub activity_list_version: i32,
    pub events_indexed: i32,
    pub textures: TableRef,
    pub texture_dirs: TableRef,
    pub skin_reference_count: i32,
    pub skin_family_count: i32,
    pub skin_family_offset: i32,
    pub body_parts: TableRef,
    pub attachments: TableRef,
    pub local_node_count: i32,
    pub local_node_index: i32,
    pub local_node_name_index: i32,
    pub flex_descs: TableRef,
    pub flex_controllers: TableRef,
    pub flex_rules: TableRef,
    pub ik_chains: TableRef,
    pub mouths: TableRef,
    pub pose_params: TableRef,

    pub surface_prop: String,
    pub key_values: String,
    pub ik_locks: TableRef,
    pub mass: f32,
    pub contents: i32,
    pub include_models: TableRef,
    pub virtual_model: i32,

    /// Base name of the external animation block file, empty when unused
    pub anim_block_name: String,
    pub anim_blocks: TableRef,
    pub anim_block_model: i32,
    pub bone_table_by_name_index: i32,
    pub vertex_base: i32,
    pub index_base: i32,

    pub directional_dot_product: u8,
    pub root_lod: u8,
    pub num_allowed_root_lods: u8,
}

impl MdlHeader {
    /// Parse the header from the start of an MDL buffer
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.seek(0)?;
        read_magic(cursor, MDL_MAGIC)?;
        Self::parse_fields(cursor).map_err(|e| e.within(HEADER))
    }

    fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = MdlVersion::parse(cursor.read_i32()?)?;
        let checksum = cursor.read_i32()?;
        let name = cursor.read_fixed_string(NAME_LEN)?;
        let data_length = cursor.read_i32()?;

        let eye_position = cursor.read_vec3()?;
        let illum_position = cursor.read_vec3()?;
        let hull_min = cursor.read_vec3()?;
        let hull_max = cursor.read_vec3()?;
        let view_bb_min = cursor.read_vec3()?;
        let view_bb_max = cursor.read_vec3()?;

        let flags = MdlFlags::from_bits_retain(cursor.read_u32()?);

        let bones = cursor.read_table_ref(HEADER, "bones")?;
        let bone_controllers = cursor.read_table_ref(HEADER, "bone_controllers")?;
        let hitbox_sets = cursor.read_table_ref(HEADER, "hitbox_sets")?;
        let local_anims = cursor.read_table_ref(HEADER, "local_anims")?;
        let local_seqs = cursor.read_table_ref(HEADER, "local_seqs")?;
        let activity_list_version = cursor.read_i32()?;
        let events_indexed = cursor.read_i32()?;
        let textures = cursor.read_table_ref(HEADER, "textures")?;
        let texture_dirs = cursor.read_table_ref(HEADER, "texture_dirs")?;
        let skin_reference_count = cursor.read_i32()?;
        let skin_family_count = cursor.read_i32()?;
        let skin_family_offset = cursor.read_i32()?;
        let body_parts = cursor.read_table_ref(HEADER, "body_parts")?;
        let attachments = cursor.read_table_ref(HEADER, "attachments")?;
        let local_node_count = cursor.read_i32()?;
        let local_node_index = cursor.read_i32()?;
        let local_node_name_index = cursor.read_i32()?;
        let flex_descs = cursor.read_table_ref(HEADER, "flex_descs")?;
        let flex_controllers = cursor.read_table_ref(HEADER, "flex_controllers")?;
        let flex_rules = cursor.read_table_ref(HEADER, "flex_rules")?;
        let ik_chains = cursor.read_table_ref(HEADER, "ik_chains")?;
        let mouths = cursor.read_table_ref(HEADER, "mouths")?;
        let pose_params = cursor.read_table_ref(HEADER, "pose_params")?;

        let surface_prop_index = cursor.read_i32()?;
        let key_value_index = cursor.read_i32()?;
        let key_value_size = cursor.read_i32()?;
        let ik_locks = cursor.read_table_ref(HEADER, "ik_locks")?;
        let mass = cursor.read_f32()?;
        let contents = cursor.read_i32()?;
        let include_models = cursor.read_table_ref(HEADER, "include_models")?;
        let virtual_model = cursor.read_i32()?;

        let anim_block_name_index = cursor.read_i32()?;
        let anim_blocks = cursor.read_table_ref(HEADER, "anim_blocks")?;
        let anim_block_model = cursor.read_i32()?;
        let bone_table_by_name_index = cursor.read_i32()?;
        let vertex_base = cursor.read_i32()?;
        let index_base = cursor.read_i32()?;

        let directional_dot_product = cursor.read_u8()?;
        let root_lod = cursor.read_u8()?;
        let num_allowed_root_lods = cursor.read_u8()?;
        cursor.skip(1)?;

        let surface_prop = cursor.read_string_rel(0, surface_prop_index, HEADER, "surface_prop")?;
        let anim_block_name =
            cursor.read_string_rel(0, anim_block_name_index, HEADER, "anim_block_name")?;
        let key_values =
            cursor.read_text_rel(0, key_value_index, key_value_size, HEADER, "key_values")?;

        log::debug!(
            "MDL '{}' v{} checksum {:#010x}: {} bones, {} anims, {} sequences, {} textures, {} body parts",
            name,
            version,
            checksum,
            bones.count,
            local_anims.count,
            local_seqs.count,
            textures.count,
            body_parts.count
        );

        Ok(Self {
            version,
            checksum,
            name,
            data_length,
            eye_position,
            illum_position,
            hull_min,
            hull_max,
            view_bb_min,
            view_bb_max,
            flags,
            bones,
            bone_controllers,
            hitbox_sets,
            local_anims,
            local_seqs,
            activity_list_version,
            events_indexed,
            textures,
            texture_dirs,
            skin_reference_count,
            skin_family_count,
            skin_family_offset,
            body_parts,
            attachments,
            local_node_count,
            local_node_index,
            local_node_name_index,
            flex_descs,
            flex_controllers,
            flex_rules,
            ik_chains,
            mouths,
            pose_params,
            surface_prop,
            key_values,
            ik_locks,
            mass,
            contents,
            include_models,
            virtual_model,
            anim_block_name,
            anim_blocks,
            anim_block_model,
            bone_table_by_name_index,
            vertex_base,
            index_base,
            directional_dot_product,
            root_lod,
            num_allowed_root_lods,
        })
    }

    /// Whether the model streams some animation sections from a separate file
    pub fn has_anim_blocks(&self) -> bool {
        !self.anim_block_name.is_empty() && self.anim_blocks.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header(version: i32) -> Vec<u8> {
        let mut data = vec![0u8; MDL_HEADER_SIZE];
        data[0..4].copy_from_slice(&MDL_MAGIC);
        data[4..8].copy_from_slice(&version.to_le_bytes());
        data[8..12].copy_from_slice(&0x1234i32.to_le_bytes());
        data[12..18].copy_from_slice(b"barrel");
        data[152..156].copy_from_slice(&0x10u32.to_le_bytes());
        data[328..332].copy_from_slice(&25.0f32.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_minimal_header() {
        let data = minimal_header(48);
        let mut cursor = Cursor::new(&data);
        let header = MdlHeader::parse(&mut cursor).unwrap();

        assert_eq!(header.version, MdlVersion::V48);
        assert_eq!(header.checksum, 0x1234);
        assert_eq!(header.name, "barrel");
        assert_eq!(header.flags, MdlFlags::STATIC_PROP);
        assert_eq!(header.mass, 25.0);
        assert!(header.bones.is_empty());
        assert_eq!(header.surface_prop, "");
        assert!(!header.has_anim_blocks());
        assert_eq!(cursor.position(), MDL_HEADER_SIZE as u64);
    }

    #[test]
    fn test_table_descriptor_positions() {
        let mut data = minimal_header(49);
        data[156..160].copy_from_slice(&3i32.to_le_bytes());
        data[160..164].copy_from_slice(&400i32.to_le_bytes());
        data[232..236].copy_from_slice(&2i32.to_le_bytes());
        data[236..240].copy_from_slice(&900i32.to_le_bytes());
        let header = MdlHeader::parse(&mut Cursor::new(&data)).unwrap();

        assert_eq!((header.bones.count, header.bones.offset), (3, 400));
        assert_eq!((header.bones.count_at, header.bones.pair_end), (156, 164));
        assert_eq!(header.body_parts.count_at, 232);
        assert_eq!(header.body_parts.count_at, SKIN_FAMILY_COUNT_AT + 8);
        assert_eq!((header.body_parts.count, header.body_parts.offset), (2, 900));
    }

    #[test]
    fn test_surface_prop_and_key_values() {
        let mut data = minimal_header(48);
        let surface = data.len() as i32;
        data.extend_from_slice(b"metal\0");
        let kv = data.len() as i32;
        data.extend_from_slice(b"prop_data { }\0");
        data[308..312].copy_from_slice(&surface.to_le_bytes());
        data[312..316].copy_from_slice(&kv.to_le_bytes());
        data[316..320].copy_from_slice(&14i32.to_le_bytes());

        let header = MdlHeader::parse(&mut Cursor::new(&data)).unwrap();
        assert_eq!(header.surface_prop, "metal");
        assert_eq!(header.key_values, "prop_data { }");
    }

    #[test]
    fn test_wrong_magic() {
        let mut data = minimal_header(48);
        data[0..4].copy_from_slice(b"IDSV");
        let err = MdlHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        match err {
            StudioError::InvalidMagic { expected, actual } => {
                assert_eq!(expected, "IDST");
                assert_eq!(actual, "IDSV");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let data = minimal_header(37);
        let err = MdlHeader::parse(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(
            err,
            StudioError::UnsupportedVersion { version: 37, .. }
        ));
    }

    #[test]
    fn test_truncated_header() {
        let data = minimal_header(48);
        let err = MdlHeader::parse(&mut Cursor::new(&data[..200])).unwrap_err();
        assert!(matches!(
            err,
            StudioError::TruncatedBuffer {
                structure: Some("mdl header"),
                ..
            }
        ));
    }
}
