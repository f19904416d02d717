use bitflags::bitflags;
use glam::{Affine3A, Quat, Vec3};

use crate::common::{Matrix3x4, RecordLayout};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

pub const BONE: RecordLayout = RecordLayout::new("bone", 216);

const BONE_CONTROLLERS: usize = 6;
const BONE_RESERVED: usize = 32;

bitflags! {
    /// Bone usage and procedural flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
    pub struct BoneFlags: u32 {
        const PHYSICALLY_SIMULATED = 0x01;
        const PHYSICS_PROCEDURAL = 0x02;
        const ALWAYS_PROCEDURAL = 0x04;
        const SCREEN_ALIGN_SPHERE = 0x08;
        const SCREEN_ALIGN_CYLINDER = 0x10;
        const USED_BY_HITBOX = 0x100;
        const USED_BY_ATTACHMENT = 0x200;
        const USED_BY_VERTEX_LOD0 = 0x400;
        const USED_BY_VERTEX_LOD1 = 0x800;
        const USED_BY_VERTEX_LOD2 = 0x1000;
        const USED_BY_VERTEX_LOD3 = 0x2000;
        const USED_BY_VERTEX_LOD4 = 0x4000;
        const USED_BY_VERTEX_LOD5 = 0x8000;
        const USED_BY_VERTEX_LOD6 = 0x10000;
        const USED_BY_VERTEX_LOD7 = 0x20000;
        const USED_BY_BONE_MERGE = 0x40000;
        const FIXED_ALIGNMENT = 0x100000;
        const HAS_SAVEFRAME_POS = 0x200000;
        const HAS_SAVEFRAME_ROT = 0x400000;
    }
}

/// A skeletal joint with its rest transform
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Bone {
    pub name: String,
    /// Parent index as stored; negative for roots
    pub parent_index: i32,
    /// Bone controller driving each of x, y, z, rx, ry, rz, or -1
    pub bone_controllers: [i32; BONE_CONTROLLERS],
    pub position: Vec3,
    pub rotation: Quat,
    /// Euler rest rotation in radians, used as the base for keyed rotation
    pub euler: Vec3,
    pub position_scale: Vec3,
    pub rotation_scale: Vec3,
    pub pose_to_bone: Matrix3x4,
    pub alignment: Quat,
    pub flags: BoneFlags,
    pub procedural_type: i32,
    pub procedural_index: i32,
    pub physics_bone: i32,
    pub surface_prop: String,
    pub contents: i32,

    parent: Option<usize>,
    children: Vec<usize>,
}

impl Bone {
    /// Read one bone record at the cursor
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let name_index = cursor.read_i32()?;
        let parent_index = cursor.read_i32()?;
        let mut bone_controllers = [0i32; BONE_CONTROLLERS];
        for controller in &mut bone_controllers {
            *controller = cursor.read_i32()?;
        }
        let position = cursor.read_vec3()?;
        let rotation = cursor.read_quat()?;
        let euler = cursor.read_vec3()?;
        let position_scale = cursor.read_vec3()?;
        let rotation_scale = cursor.read_vec3()?;
        let pose_to_bone = cursor.read_matrix3x4()?;
        let alignment = cursor.read_quat()?;
        let flags = BoneFlags::from_bits_retain(cursor.read_u32()?);
        let procedural_type = cursor.read_i32()?;
        let procedural_index = cursor.read_i32()?;
        let physics_bone = cursor.read_i32()?;
        let surface_prop_index = cursor.read_i32()?;
        let contents = cursor.read_i32()?;
        cursor.skip(BONE_RESERVED)?;

        let name = cursor.read_string_rel(start, name_index, "bone", "name")?;
        let surface_prop =
            cursor.read_string_rel(start, surface_prop_index, "bone", "surface_prop")?;

        Ok(Self {
            name,
            parent_index,
            bone_controllers,
            position,
            rotation,
            euler,
            position_scale,
            rotation_scale,
            pose_to_bone,
            alignment,
            flags,
            procedural_type,
            procedural_index,
            physics_bone,
            surface_prop,
            contents,
            parent: None,
            children: Vec::new(),
        })
    }

    /// Parent bone, `None` for roots
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Child bones in index order
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Rest transform relative to the parent bone
    pub fn local_transform(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.position)
    }

    #[cfg(test)]
    pub(crate) fn named(name: &str, parent_index: i32) -> Self {
        Self {
            name: name.to_string(),
            parent_index,
            bone_controllers: [-1; BONE_CONTROLLERS],
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            euler: Vec3::ZERO,
            position_scale: Vec3::ONE,
            rotation_scale: Vec3::ONE,
            pose_to_bone: Matrix3x4::IDENTITY,
            alignment: Quat::IDENTITY,
            flags: BoneFlags::empty(),
            procedural_type: 0,
            procedural_index: 0,
            physics_bone: 0,
            surface_prop: String::new(),
            contents: 0,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// The bone forest of a model.
///
/// Bones are stored in file order and linked by index; a parent always has a
/// lower index than its children.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Skeleton {
    bones: Vec<Bone>,
    roots: Vec<usize>,
}

impl Skeleton {
    /// Link a flat bone array into a forest in one pass
    pub fn new(mut bones: Vec<Bone>) -> Result<Self> {
        let bone_count = bones.len();
        let mut roots = Vec::new();

        for i in 0..bone_count {
            let parent = bones[i].parent_index;
            if parent < 0 {
                roots.push(i);
                continue;
            }
            let p = parent as usize;
            if p >= i {
                return Err(StudioError::BoneIndexOutOfRange {
                    bone: i,
                    parent,
                    bone_count,
                });
            }
            bones[i].parent = Some(p);
            bones[p].children.push(i);
        }

        log::trace!("skeleton: {} bones, {} roots", bone_count, roots.len());
        Ok(Self { bones, roots })
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn get(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Indices of bones without a parent
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Index of the first bone with the given name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Number of ancestors of a bone
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.bones.get(index).and_then(Bone::parent);
        while let Some(p) = current {
            depth += 1;
            current = self.bones[p].parent;
        }
        depth
    }

    /// Bone indices in depth-first pre-order, roots and children in index order
    pub fn depth_first(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.bones[i].children.iter().rev());
        }
        order
    }

    /// Model-space rest transform of every bone
    pub fn rest_world_transforms(&self) -> Vec<Affine3A> {
        let mut world: Vec<Affine3A> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.local_transform();
            let transform = match bone.parent {
                Some(p) => world[p] * local,
                None => local,
            };
            world.push(transform);
        }
        world
    }
}
