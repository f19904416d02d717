//! VVD vertex buffers

use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::chunks::body_part::MAX_LODS;
use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};
use crate::header::read_magic;
use crate::limits::ParseLimits;
use crate::version::VVD_VERSION;

/// Magic signature for VVD files ("IDSV")
pub const VVD_MAGIC: [u8; 4] = *b"IDSV";

pub const VVD_HEADER_SIZE: usize = 64;
pub const FIXUP: RecordLayout = RecordLayout::new("vvd fixup", 12);
pub const VERTEX: RecordLayout = RecordLayout::new("vvd vertex", 48);
pub const TANGENT: RecordLayout = RecordLayout::new("vvd tangent", 16);

/// Maximum bone influences per vertex
pub const MAX_BONES_PER_VERTEX: usize = 3;

const HEADER: &str = "vvd header";
/// File position of the LOD 0 vertex count
const LOD_VERTEX_COUNTS_AT: u64 = 16;

/// Bone influences of one vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct BoneWeights {
    pub weights: [f32; MAX_BONES_PER_VERTEX],
    pub bones: [i8; MAX_BONES_PER_VERTEX],
    pub bone_count: u8,
}

impl BoneWeights {
    /// The `(bone, weight)` pairs actually in use
    pub fn influences(&self) -> impl Iterator<Item = (i8, f32)> + '_ {
        let used = (self.bone_count as usize).min(MAX_BONES_PER_VERTEX);
        self.bones[..used]
            .iter()
            .copied()
            .zip(self.weights[..used].iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Vertex {
    pub bone_weights: BoneWeights,
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut weights = [0.0; MAX_BONES_PER_VERTEX];
        for w in &mut weights {
            *w = cursor.read_f32()?;
        }
        let mut bones = [0i8; MAX_BONES_PER_VERTEX];
        for b in &mut bones {
            *b = cursor.read_i8()?;
        }
        let bone_count = cursor.read_u8()?;

        Ok(Self {
            bone_weights: BoneWeights {
                weights,
                bones,
                bone_count,
            },
            position: cursor.read_vec3()?,
            normal: cursor.read_vec3()?,
            uv: cursor.read_vec2()?,
        })
    }
}

/// Maps a run of shared vertices into the LODs that use it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Fixup {
    /// Highest LOD that still uses this run
    pub lod: i32,
    pub source_vertex: u32,
    pub vertex_count: u32,
}

impl Fixup {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let lod = cursor.read_i32()?;
        let source_at = cursor.position();
        let source = cursor.read_i32()?;
        let count = cursor.read_i32()?;
        Ok(Self {
            lod,
            source_vertex: cursor.checked_count("vvd fixup", "source_vertex", source, source_at)?
                as u32,
            vertex_count: cursor.checked_count("vvd fixup", "vertex_count", count, source_at + 4)?
                as u32,
        })
    }

    fn range(&self) -> std::ops::Range<usize> {
        let start = self.source_vertex as usize;
        start..start + self.vertex_count as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct VvdHeader {
    pub version: i32,
    pub checksum: i32,
    pub lod_count: usize,
    pub lod_vertex_counts: [i32; MAX_LODS],
    pub fixups: TableRef,
    pub vertex_offset: i32,
    pub tangent_offset: i32,
}

impl VvdHeader {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.seek(0)?;
        read_magic(cursor, VVD_MAGIC)?;
        Self::parse_fields(cursor).map_err(|e| e.within(HEADER))
    }

    fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = cursor.read_i32()?;
        if version != VVD_VERSION {
            return Err(StudioError::UnsupportedVersion {
                format: "VVD",
                version,
                supported: "4",
            });
        }
        let checksum = cursor.read_i32()?;
        let lod_count_at = cursor.position();
        let raw_lods = cursor.read_i32()?;
        let lod_count = cursor.checked_count(HEADER, "lod_count", raw_lods, lod_count_at)?;
        if lod_count > MAX_LODS {
            return Err(StudioError::LimitExceeded {
                structure: HEADER,
                field: "lod_count",
                value: lod_count as u64,
                limit: MAX_LODS as u64,
            });
        }
        let mut lod_vertex_counts = [0i32; MAX_LODS];
        for count in &mut lod_vertex_counts {
            *count = cursor.read_i32()?;
        }
        let fixups = cursor.read_table_ref(HEADER, "fixups")?;
        let vertex_offset = cursor.read_i32()?;
        let tangent_offset = cursor.read_i32()?;

        Ok(Self {
            version,
            checksum,
            lod_count,
            lod_vertex_counts,
            fixups,
            vertex_offset,
            tangent_offset,
        })
    }
}

/// A decoded VVD file.
///
/// Vertices and tangents are stored once for LOD 0; lower LODs select ranges of
/// the same arrays through fixups.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Vvd {
    pub header: VvdHeader,
    pub fixups: Vec<Fixup>,
    pub vertices: Vec<Vertex>,
    pub tangents: Vec<Vec4>,
}

impl Vvd {
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_limits(data, ParseLimits::default())
    }

    pub fn parse_with_limits(data: &[u8], limits: ParseLimits) -> Result<Self> {
        let mut cursor = Cursor::with_limits(data, limits);
        let header = VvdHeader::parse(&mut cursor)?;
        let file = OffsetOrigin::Start(0);

        let fixups = cursor.read_table(&header.fixups, file, FIXUP, |c, _| Fixup::parse(c))?;

        let count = header.lod_vertex_counts[0];
        let vertex_table = TableRef::new(
            HEADER,
            "vertices",
            count,
            header.vertex_offset,
            LOD_VERTEX_COUNTS_AT,
        );
        let vertices = cursor.read_table(&vertex_table, file, VERTEX, |c, _| Vertex::parse(c))?;
        let tangent_table = TableRef::new(
            HEADER,
            "tangents",
            count,
            header.tangent_offset,
            LOD_VERTEX_COUNTS_AT,
        );
        let tangents = cursor.read_table(&tangent_table, file, TANGENT, |c, _| c.read_vec4())?;

        for fixup in &fixups {
            if fixup.range().end > vertices.len() {
                return Err(StudioError::InvalidReference {
                    structure: "vvd fixup",
                    field: "vertex_count",
                    value: fixup.range().end as i64,
                    max: vertices.len() as i64,
                });
            }
        }

        log::debug!(
            "Parsed VVD checksum {:#010x}: {} LODs, {} vertices, {} fixups",
            header.checksum,
            header.lod_count,
            vertices.len(),
            fixups.len()
        );

        Ok(Self {
            header,
            fixups,
            vertices,
            tangents,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    /// Vertices used by one LOD, or `None` past the last LOD
    pub fn lod_vertices(&self, lod: usize) -> Option<Vec<Vertex>> {
        self.lod_select(lod, &self.vertices)
    }

    /// Tangents used by one LOD, parallel to [`Vvd::lod_vertices`]
    pub fn lod_tangents(&self, lod: usize) -> Option<Vec<Vec4>> {
        self.lod_select(lod, &self.tangents)
    }

    fn lod_select<T: Copy>(&self, lod: usize, items: &[T]) -> Option<Vec<T>> {
        if lod >= self.header.lod_count.max(1) {
            return None;
        }
        if self.fixups.is_empty() {
            return Some(items.to_vec());
        }
        Some(
            self.fixups
                .iter()
                .filter(|f| f.lod >= lod as i32)
                .filter_map(|f| items.get(f.range()))
                .flatten()
                .copied()
                .collect(),
        )
    }
}
