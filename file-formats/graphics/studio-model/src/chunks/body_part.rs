use glam::Vec3;

use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::Result;

pub const BODY_PART: RecordLayout = RecordLayout::new("body part", 16);
pub const MODEL: RecordLayout = RecordLayout::new("model", 148);
pub const MESH: RecordLayout = RecordLayout::new("mesh", 116);

/// Maximum number of LODs tracked per mesh and per VVD file
pub const MAX_LODS: usize = 8;

const MODEL_NAME_LEN: usize = 64;
const MODEL_RESERVED: usize = 32;
const MESH_RESERVED: usize = 32;
/// Size of an on-disk VVD vertex, used to turn byte offsets into indices
const VERTEX_STRIDE: i32 = 48;

/// A group of interchangeable models, one of which is shown at a time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct BodyPart {
    pub name: String,
    /// Multiplier for the model index when building a body group value
    pub base: i32,
    pub models: Vec<Model>,
}

impl BodyPart {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let name_index = cursor.read_i32()?;
        let model_count_at = cursor.position();
        let model_count = cursor.read_i32()?;
        let base = cursor.read_i32()?;
        let model_index = cursor.read_i32()?;

        let name = cursor.read_string_rel(start, name_index, "body part", "name")?;
        let table = TableRef::new("body part", "models", model_count, model_index, model_count_at);
        let models = cursor.read_table(&table, OffsetOrigin::Start(start), MODEL, |c, _| {
            Model::parse(c)
        })?;

        Ok(Self { name, base, models })
    }
}

/// One selectable model of a body part
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Model {
    pub name: String,
    pub kind: i32,
    pub bounding_radius: f32,
    pub meshes: Vec<Mesh>,
    pub vertex_count: i32,
    /// Byte offset of the first vertex inside the VVD vertex data
    pub vertex_index: i32,
    pub tangent_index: i32,
    pub attachment_count: i32,
    pub eyeball_count: i32,
}

impl Model {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let name = cursor.read_fixed_string(MODEL_NAME_LEN)?;
        let kind = cursor.read_i32()?;
        let bounding_radius = cursor.read_f32()?;
        let meshes = cursor.read_table_ref("model", "meshes")?;
        let vertex_count = cursor.read_i32()?;
        let vertex_index = cursor.read_i32()?;
        let tangent_index = cursor.read_i32()?;
        let attachment_count = cursor.read_i32()?;
        let _attachment_index = cursor.read_i32()?;
        let eyeball_count = cursor.read_i32()?;
        let _eyeball_index = cursor.read_i32()?;
        // vertex data pointers, filled in at runtime
        cursor.skip(8)?;
        cursor.skip(MODEL_RESERVED)?;

        let meshes = cursor.read_table(&meshes, OffsetOrigin::Start(start), MESH, |c, _| {
            Mesh::parse(c)
        })?;

        Ok(Self {
            name,
            kind,
            bounding_radius,
            meshes,
            vertex_count,
            vertex_index,
            tangent_index,
            attachment_count,
            eyeball_count,
        })
    }

    /// Index of the model's first vertex in the shared VVD vertex array
    pub fn first_vertex(&self) -> usize {
        (self.vertex_index / VERTEX_STRIDE).max(0) as usize
    }
}

/// A run of a model's vertices sharing one material
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Mesh {
    /// Material slot, resolved through the skin table
    pub material: i32,
    pub vertex_count: i32,
    /// First vertex relative to the owning model
    pub vertex_offset: i32,
    pub flex_count: i32,
    pub material_type: i32,
    pub material_param: i32,
    pub mesh_id: i32,
    pub center: Vec3,
    pub lod_vertex_counts: [i32; MAX_LODS],
}

impl Mesh {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let material = cursor.read_i32()?;
        let _model_index = cursor.read_i32()?;
        let vertex_count = cursor.read_i32()?;
        let vertex_offset = cursor.read_i32()?;
        let flex_count = cursor.read_i32()?;
        let _flex_index = cursor.read_i32()?;
        let material_type = cursor.read_i32()?;
        let material_param = cursor.read_i32()?;
        let mesh_id = cursor.read_i32()?;
        let center = cursor.read_vec3()?;
        // model vertex data pointer
        cursor.skip(4)?;
        let mut lod_vertex_counts = [0i32; MAX_LODS];
        for count in &mut lod_vertex_counts {
            *count = cursor.read_i32()?;
        }
        cursor.skip(MESH_RESERVED)?;

        Ok(Self {
            material,
            vertex_count,
            vertex_offset,
            flex_count,
            material_type,
            material_param,
            mesh_id,
            center,
            lod_vertex_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn put_i32(data: &mut [u8], at: usize, value: i32) {
        data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_body_part_hierarchy() {
        // body part at 0, model at 16, two meshes at 164
        let mut data = vec![0u8; BODY_PART.size + MODEL.size + 2 * MESH.size];
        put_i32(&mut data, 4, 1);
        put_i32(&mut data, 8, 1);
        put_i32(&mut data, 12, BODY_PART.size as i32);

        let model = BODY_PART.size;
        data[model..model + 4].copy_from_slice(b"lod0");
        put_i32(&mut data, model + 72, 2);
        put_i32(&mut data, model + 76, MODEL.size as i32);
        put_i32(&mut data, model + 80, 30);
        put_i32(&mut data, model + 84, 96);

        let mesh = model + MODEL.size;
        put_i32(&mut data, mesh, 0);
        put_i32(&mut data, mesh + 8, 10);
        put_i32(&mut data, mesh + 52, 10);
        put_i32(&mut data, mesh + MESH.size, 1);
        put_i32(&mut data, mesh + MESH.size + 8, 20);
        put_i32(&mut data, mesh + MESH.size + 12, 10);
        data.extend_from_slice(b"body\0");
        let name_at = data.len() as i32 - 5;
        put_i32(&mut data, 0, name_at);

        let mut cursor = Cursor::new(&data);
        let part = BodyPart::parse(&mut cursor).unwrap();
        assert_eq!(part.name, "body");
        assert_eq!(part.base, 1);
        assert_eq!(part.models.len(), 1);

        let model = &part.models[0];
        assert_eq!(model.name, "lod0");
        assert_eq!(model.vertex_count, 30);
        assert_eq!(model.first_vertex(), 2);
        assert_eq!(model.meshes.len(), 2);
        assert_eq!(model.meshes[0].lod_vertex_counts[0], 10);
        assert_eq!(model.meshes[1].material, 1);
        assert_eq!(model.meshes[1].vertex_offset, 10);
        assert_eq!(cursor.position(), BODY_PART.size as u64);
    }
}
