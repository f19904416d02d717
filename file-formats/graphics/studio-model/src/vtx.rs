//! VTX render batches.
//!
//! The hierarchy mirrors the MDL body parts, models and meshes, adding a LOD
//! level below each model. Offsets inside the hierarchy are stored relative to
//! the record holding them; the `*_PAIR_END` constants give the distance from a
//! record's start to the end of each `(count, offset)` pair so the origin can be
//! recovered from the pair's position.

use std::fs;
use std::path::Path;

use bitflags::bitflags;

use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};
use crate::limits::ParseLimits;
use crate::version::{MdlVersion, VTX_VERSION};

pub const VTX_HEADER_SIZE: usize = 36;
pub const BODY_PART: RecordLayout = RecordLayout::new("vtx body part", 8);
pub const MODEL: RecordLayout = RecordLayout::new("vtx model", 8);
pub const MODEL_LOD: RecordLayout = RecordLayout::new("vtx model lod", 12);
pub const MESH: RecordLayout = RecordLayout::new("vtx mesh", 9);
pub const VERTEX: RecordLayout = RecordLayout::new("vtx vertex", 9);
pub const BONE_STATE_CHANGE: RecordLayout = RecordLayout::new("bone state change", 8);
pub const MATERIAL_REPLACEMENT_LIST: RecordLayout =
    RecordLayout::new("material replacement list", 8);
pub const MATERIAL_REPLACEMENT: RecordLayout = RecordLayout::new("material replacement", 6);

const STRIP_GROUP_SIZE: usize = 25;
const STRIP_GROUP_SIZE_V49: usize = 33;
const STRIP_SIZE: usize = 27;
const STRIP_SIZE_V49: usize = 35;

const BODY_PART_MODELS_PAIR_END: u64 = 8;
const MODEL_LODS_PAIR_END: u64 = 8;
const LOD_MESHES_PAIR_END: u64 = 8;
const MESH_STRIP_GROUPS_PAIR_END: u64 = 8;
const STRIP_GROUP_VERTICES_PAIR_END: u64 = 8;
const STRIP_GROUP_INDICES_PAIR_END: u64 = 16;
const STRIP_GROUP_STRIPS_PAIR_END: u64 = 24;
const STRIP_GROUP_TOPOLOGY_PAIR_END: u64 = 33;
const STRIP_BONE_STATE_PAIR_END: u64 = 27;

/// Maximum bone influences per vertex
pub const MAX_BONES_PER_VERTEX: usize = 3;

const HEADER: &str = "vtx header";
const LOD_COUNT_AT: u64 = 20;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct MeshFlags: u8 {
        const TEETH = 0x01;
        const EYES = 0x02;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct StripGroupFlags: u8 {
        const FLEXED = 0x01;
        const HW_SKINNED = 0x02;
        const DELTA_FLEXED = 0x04;
        const SUPPRESS_HW_MORPH = 0x08;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct StripFlags: u8 {
        const TRILIST = 0x01;
        const TRISTRIP = 0x02;
    }
}

/// Strip group record layout for a model version
pub fn strip_group_layout(version: MdlVersion) -> RecordLayout {
    let size = if version.has_vtx_topology() {
        STRIP_GROUP_SIZE_V49
    } else {
        STRIP_GROUP_SIZE
    };
    RecordLayout::new("strip group", size)
}

/// Strip record layout for a model version
pub fn strip_layout(version: MdlVersion) -> RecordLayout {
    let size = if version.has_vtx_topology() {
        STRIP_SIZE_V49
    } else {
        STRIP_SIZE
    };
    RecordLayout::new("strip", size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VtxHeader {
    pub version: i32,
    pub vertex_cache_size: i32,
    pub max_bones_per_strip: u16,
    pub max_bones_per_triangle: u16,
    pub max_bones_per_vertex: i32,
    pub checksum: i32,
    pub lod_count: i32,
    pub material_replacement_list_offset: i32,
    pub body_parts: TableRef,
}

impl VtxHeader {
    /// Parse the header. There is no magic; the version word identifies the file.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.seek(0)?;
        Self::parse_fields(cursor).map_err(|e| e.within(HEADER))
    }

    fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = cursor.read_i32()?;
        if version != VTX_VERSION {
            return Err(StudioError::UnsupportedVersion {
                format: "VTX",
                version,
                supported: "7",
            });
        }
        Ok(Self {
            version,
            vertex_cache_size: cursor.read_i32()?,
            max_bones_per_strip: cursor.read_u16()?,
            max_bones_per_triangle: cursor.read_u16()?,
            max_bones_per_vertex: cursor.read_i32()?,
            checksum: cursor.read_i32()?,
            lod_count: cursor.read_i32()?,
            material_replacement_list_offset: cursor.read_i32()?,
            body_parts: cursor.read_table_ref(HEADER, "body_parts")?,
        })
    }
}

/// A render vertex referring back to a mesh vertex in the VVD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VtxVertex {
    /// Index into the source vertex's bone weights per influence
    pub bone_weight_index: [u8; MAX_BONES_PER_VERTEX],
    pub bone_count: u8,
    /// Vertex index relative to the owning MDL mesh
    pub original_mesh_vertex: u16,
    /// Hardware bone slot per influence
    pub bone_ids: [i8; MAX_BONES_PER_VERTEX],
}

impl VtxVertex {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let bone_weight_index = cursor.read_bytes()?;
        let bone_count = cursor.read_u8()?;
        let original_mesh_vertex = cursor.read_u16()?;
        let mut bone_ids = [0i8; MAX_BONES_PER_VERTEX];
        for id in &mut bone_ids {
            *id = cursor.read_i8()?;
        }
        Ok(Self {
            bone_weight_index,
            bone_count,
            original_mesh_vertex,
            bone_ids,
        })
    }
}

/// Hardware bone slot assignment made before drawing a strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct BoneStateChange {
    pub hardware_id: i32,
    pub new_bone_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Strip {
    pub index_count: u32,
    /// First index inside the strip group index array
    pub index_offset: u32,
    pub vertex_count: u32,
    /// First vertex inside the strip group vertex array
    pub vertex_offset: u32,
    pub bone_count: i16,
    pub flags: StripFlags,
    pub bone_state_changes: Vec<BoneStateChange>,
    pub topology_count: u32,
    pub topology_offset: u32,
}

impl Strip {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let start = cursor.position();
        let index_count = cursor.read_i32()?;
        let index_offset = cursor.read_i32()?;
        let vertex_count = cursor.read_i32()?;
        let vertex_offset = cursor.read_i32()?;
        let bone_count = cursor.read_i16()?;
        let flags = StripFlags::from_bits_retain(cursor.read_u8()?);
        let changes = cursor.read_table_ref("strip", "bone_state_changes")?;
        let (topology_count, topology_offset) = if version.has_vtx_topology() {
            (cursor.read_i32()?, cursor.read_i32()?)
        } else {
            (0, 0)
        };

        let bone_state_changes = cursor.read_table(
            &changes,
            OffsetOrigin::PairEnd {
                back: STRIP_BONE_STATE_PAIR_END,
            },
            BONE_STATE_CHANGE,
            |c, _| {
                Ok(BoneStateChange {
                    hardware_id: c.read_i32()?,
                    new_bone_id: c.read_i32()?,
                })
            },
        )?;

        let field = |name, value| non_negative(start, name, value);
        Ok(Self {
            index_count: field("index_count", index_count)?,
            index_offset: field("index_offset", index_offset)?,
            vertex_count: field("vertex_count", vertex_count)?,
            vertex_offset: field("vertex_offset", vertex_offset)?,
            bone_count,
            flags,
            bone_state_changes,
            topology_count: field("topology_count", topology_count)?,
            topology_offset: field("topology_offset", topology_offset)?,
        })
    }

    fn index_range(&self) -> std::ops::Range<usize> {
        let start = self.index_offset as usize;
        start..start + self.index_count as usize
    }

    fn vertex_range(&self) -> std::ops::Range<usize> {
        let start = self.vertex_offset as usize;
        start..start + self.vertex_count as usize
    }

    fn topology_range(&self) -> std::ops::Range<usize> {
        let start = self.topology_offset as usize;
        start..start + self.topology_count as usize
    }
}

fn non_negative(at: u64, field: &'static str, value: i32) -> Result<u32> {
    if value < 0 {
        return Err(StudioError::InvalidCount {
            structure: "strip",
            field,
            count: value as i64,
            offset: at,
        });
    }
    Ok(value as u32)
}

/// Vertices, indices and strips drawn with one bone palette
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct StripGroup {
    pub flags: StripGroupFlags,
    pub vertices: Vec<VtxVertex>,
    /// Indices into `vertices`
    pub indices: Vec<u16>,
    pub strips: Vec<Strip>,
    pub topology: Vec<u16>,
}

impl StripGroup {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let vertices = cursor.read_table_ref("strip group", "vertices")?;
        let indices = cursor.read_table_ref("strip group", "indices")?;
        let strips = cursor.read_table_ref("strip group", "strips")?;
        let flags = StripGroupFlags::from_bits_retain(cursor.read_u8()?);
        let topology = if version.has_vtx_topology() {
            Some(cursor.read_table_ref("strip group", "topology")?)
        } else {
            None
        };

        let vertices = cursor.read_table(
            &vertices,
            OffsetOrigin::PairEnd {
                back: STRIP_GROUP_VERTICES_PAIR_END,
            },
            VERTEX,
            |c, _| VtxVertex::parse(c),
        )?;
        let indices = cursor.read_table(
            &indices,
            OffsetOrigin::PairEnd {
                back: STRIP_GROUP_INDICES_PAIR_END,
            },
            RecordLayout::new("vtx index", 2),
            |c, _| c.read_u16(),
        )?;
        let strips = cursor.read_table(
            &strips,
            OffsetOrigin::PairEnd {
                back: STRIP_GROUP_STRIPS_PAIR_END,
            },
            strip_layout(version),
            |c, _| Strip::parse(c, version),
        )?;
        let topology = match topology {
            Some(table) => cursor.read_table(
                &table,
                OffsetOrigin::PairEnd {
                    back: STRIP_GROUP_TOPOLOGY_PAIR_END,
                },
                RecordLayout::new("topology index", 2),
                |c, _| c.read_u16(),
            )?,
            None => Vec::new(),
        };

        let group = Self {
            flags,
            vertices,
            indices,
            strips,
            topology,
        };
        group.validate()?;
        Ok(group)
    }

    fn validate(&self) -> Result<()> {
        let out_of_range = |field, value: usize, max: usize| StudioError::InvalidReference {
            structure: "strip",
            field,
            value: value as i64,
            max: max as i64,
        };
        for strip in &self.strips {
            if strip.index_range().end > self.indices.len() {
                return Err(out_of_range(
                    "index_count",
                    strip.index_range().end,
                    self.indices.len(),
                ));
            }
            if strip.vertex_range().end > self.vertices.len() {
                return Err(out_of_range(
                    "vertex_count",
                    strip.vertex_range().end,
                    self.vertices.len(),
                ));
            }
            if strip.topology_range().end > self.topology.len() {
                return Err(out_of_range(
                    "topology_count",
                    strip.topology_range().end,
                    self.topology.len(),
                ));
            }
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(StudioError::InvalidReference {
                structure: "strip group",
                field: "indices",
                value: index as i64,
                max: self.vertices.len() as i64 - 1,
            });
        }
        Ok(())
    }

    /// Triangles of one strip as indices into `vertices`.
    ///
    /// Triangle strips are unrolled with alternating winding and degenerate
    /// triangles dropped.
    pub fn strip_triangles(&self, strip: &Strip) -> Vec<[u16; 3]> {
        let Some(indices) = self.indices.get(strip.index_range()) else {
            return Vec::new();
        };
        if strip.flags.contains(StripFlags::TRISTRIP) {
            indices
                .windows(3)
                .enumerate()
                .map(|(i, w)| {
                    if i % 2 == 0 {
                        [w[0], w[1], w[2]]
                    } else {
                        [w[1], w[0], w[2]]
                    }
                })
                .filter(|[a, b, c]| a != b && b != c && a != c)
                .collect()
        } else {
            indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect()
        }
    }

    /// Triangles of every strip in the group
    pub fn triangles(&self) -> Vec<[u16; 3]> {
        self.strips
            .iter()
            .flat_map(|s| self.strip_triangles(s))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VtxMesh {
    pub flags: MeshFlags,
    pub strip_groups: Vec<StripGroup>,
}

impl VtxMesh {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let groups = cursor.read_table_ref("vtx mesh", "strip_groups")?;
        let flags = MeshFlags::from_bits_retain(cursor.read_u8()?);
        let strip_groups = cursor.read_table(
            &groups,
            OffsetOrigin::PairEnd {
                back: MESH_STRIP_GROUPS_PAIR_END,
            },
            strip_group_layout(version),
            |c, _| StripGroup::parse(c, version),
        )?;
        Ok(Self {
            flags,
            strip_groups,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct ModelLod {
    pub meshes: Vec<VtxMesh>,
    /// Screen-size threshold at which this LOD is used
    pub switch_point: f32,
}

impl ModelLod {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let meshes = cursor.read_table_ref("vtx model lod", "meshes")?;
        let switch_point = cursor.read_f32()?;
        let meshes = cursor.read_table(
            &meshes,
            OffsetOrigin::PairEnd {
                back: LOD_MESHES_PAIR_END,
            },
            MESH,
            |c, _| VtxMesh::parse(c, version),
        )?;
        Ok(Self {
            meshes,
            switch_point,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VtxModel {
    pub lods: Vec<ModelLod>,
}

impl VtxModel {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let lods = cursor.read_table_ref("vtx model", "lods")?;
        let lods = cursor.read_table(
            &lods,
            OffsetOrigin::PairEnd {
                back: MODEL_LODS_PAIR_END,
            },
            MODEL_LOD,
            |c, _| ModelLod::parse(c, version),
        )?;
        Ok(Self { lods })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VtxBodyPart {
    pub models: Vec<VtxModel>,
}

impl VtxBodyPart {
    pub fn parse(cursor: &mut Cursor<'_>, version: MdlVersion) -> Result<Self> {
        let models = cursor.read_table_ref("vtx body part", "models")?;
        let models = cursor.read_table(
            &models,
            OffsetOrigin::PairEnd {
                back: BODY_PART_MODELS_PAIR_END,
            },
            MODEL,
            |c, _| VtxModel::parse(c, version),
        )?;
        Ok(Self { models })
    }
}

/// Material substituted for one slot at a given LOD
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct MaterialReplacement {
    pub material: i16,
    pub name: String,
}

impl MaterialReplacement {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let material = cursor.read_i16()?;
        let name_index = cursor.read_i32()?;
        let name = cursor.read_string_rel(start, name_index, "material replacement", "name")?;
        Ok(Self { material, name })
    }
}

fn read_replacement_list(cursor: &mut Cursor<'_>) -> Result<Vec<MaterialReplacement>> {
    let start = cursor.position();
    let table = cursor.read_table_ref("material replacement list", "replacements")?;
    cursor.read_table(
        &table,
        OffsetOrigin::Start(start),
        MATERIAL_REPLACEMENT,
        |c, _| MaterialReplacement::parse(c),
    )
}

/// A decoded VTX file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Vtx {
    pub header: VtxHeader,
    pub body_parts: Vec<VtxBodyPart>,
    /// Replacement materials, one list per LOD
    pub material_replacements: Vec<Vec<MaterialReplacement>>,
}

impl Vtx {
    /// Parse a VTX file belonging to a model of `version`
    pub fn parse(data: &[u8], version: MdlVersion) -> Result<Self> {
        Self::parse_with_limits(data, version, ParseLimits::default())
    }

    pub fn parse_with_limits(data: &[u8], version: MdlVersion, limits: ParseLimits) -> Result<Self> {
        let mut cursor = Cursor::with_limits(data, limits);
        let header = VtxHeader::parse(&mut cursor)?;
        let file = OffsetOrigin::Start(0);

        let body_parts = cursor.read_table(&header.body_parts, file, BODY_PART, |c, _| {
            VtxBodyPart::parse(c, version)
        })?;

        let material_replacements = if header.material_replacement_list_offset == 0 {
            Vec::new()
        } else {
            let lists = TableRef::new(
                HEADER,
                "material_replacement_lists",
                header.lod_count,
                header.material_replacement_list_offset,
                LOD_COUNT_AT,
            );
            cursor.read_table(&lists, file, MATERIAL_REPLACEMENT_LIST, |c, _| {
                read_replacement_list(c)
            })?
        };

        log::debug!(
            "Parsed VTX checksum {:#010x} for MDL v{}: {} LODs, {} body parts",
            header.checksum,
            version,
            header.lod_count,
            body_parts.len()
        );

        Ok(Self {
            header,
            body_parts,
            material_replacements,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, version: MdlVersion) -> Result<Self> {
        let data = fs::read(path)?;
        Self::parse(&data, version)
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group(indices: Vec<u16>, strips: Vec<Strip>) -> StripGroup {
        StripGroup {
            flags: StripGroupFlags::HW_SKINNED,
            vertices: vec![VtxVertex::default(); 5],
            indices,
            strips,
            topology: Vec::new(),
        }
    }

    fn strip(flags: StripFlags, index_offset: u32, index_count: u32) -> Strip {
        Strip {
            index_count,
            index_offset,
            vertex_count: 0,
            vertex_offset: 0,
            bone_count: 0,
            flags,
            bone_state_changes: Vec::new(),
            topology_count: 0,
            topology_offset: 0,
        }
    }

    #[test]
    fn test_layouts_follow_version() {
        assert_eq!(strip_group_layout(MdlVersion::V48).size, 25);
        assert_eq!(strip_group_layout(MdlVersion::V49).size, 33);
        assert_eq!(strip_layout(MdlVersion::V44).size, 27);
        assert_eq!(strip_layout(MdlVersion::V49).size, 35);
    }

    #[test]
    fn test_trilist_triangles() {
        let g = group(
            vec![0, 1, 2, 2, 1, 3, 4],
            vec![strip(StripFlags::TRILIST, 0, 6)],
        );
        assert!(g.validate().is_ok());
        assert_eq!(g.triangles(), vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_tristrip_unrolled() {
        let g = group(
            vec![0, 1, 2, 3, 3, 4],
            vec![strip(StripFlags::TRISTRIP, 0, 6)],
        );
        assert_eq!(g.triangles(), vec![[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_strip_range_validated() {
        let g = group(vec![0, 1, 2], vec![strip(StripFlags::TRILIST, 1, 3)]);
        assert!(matches!(
            g.validate().unwrap_err(),
            StudioError::InvalidReference {
                field: "index_count",
                value: 4,
                max: 3,
                ..
            }
        ));

        let g = group(vec![0, 1, 7], Vec::new());
        assert!(matches!(
            g.validate().unwrap_err(),
            StudioError::InvalidReference {
                field: "indices",
                value: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_header_version_is_the_file_check() {
        let mut data = vec![0u8; VTX_HEADER_SIZE];
        data[0..4].copy_from_slice(&6i32.to_le_bytes());
        let err = Vtx::parse(&data, MdlVersion::V48).unwrap_err();
        assert!(matches!(
            err,
            StudioError::UnsupportedVersion {
                format: "VTX",
                version: 6,
                ..
            }
        ));

        data[0..4].copy_from_slice(&VTX_VERSION.to_le_bytes());
        data[16..20].copy_from_slice(&0x77i32.to_le_bytes());
        let vtx = Vtx::parse(&data, MdlVersion::V48).unwrap();
        assert_eq!(vtx.checksum(), 0x77);
        assert!(vtx.body_parts.is_empty());
        assert!(vtx.material_replacements.is_empty());
    }
}
