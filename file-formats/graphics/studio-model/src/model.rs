use std::fs;
use std::path::Path;

use crate::animation::BonePose;
use crate::chunks::animation::{ANIM_BLOCK, ANIM_DESC};
use crate::chunks::attachment::{ATTACHMENT, POSE_PARAMETER};
use crate::chunks::body_part::BODY_PART;
use crate::chunks::bone::BONE;
use crate::chunks::sequence::SEQ_DESC;
use crate::chunks::texture::{TEXTURE, read_texture_dirs};
use crate::chunks::{
    AnimBlock, AnimDesc, Attachment, BodyPart, Bone, PoseParameter, SeqDesc, Skeleton, SkinTable,
    Texture,
};
use crate::common::OffsetOrigin;
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};
use crate::header::MdlHeader;
use crate::limits::ParseLimits;

/// A fully decoded MDL file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Mdl {
    pub header: MdlHeader,
    pub skeleton: Skeleton,
    pub attachments: Vec<Attachment>,
    pub pose_parameters: Vec<PoseParameter>,
    pub anim_blocks: Vec<AnimBlock>,
    pub animations: Vec<AnimDesc>,
    pub sequences: Vec<SeqDesc>,
    pub textures: Vec<Texture>,
    pub texture_dirs: Vec<String>,
    pub skin_table: SkinTable,
    pub body_parts: Vec<BodyPart>,
}

impl Mdl {
    /// Parse an MDL file from memory with default limits
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_limits(data, ParseLimits::default())
    }

    /// Parse an MDL file from memory
    pub fn parse_with_limits(data: &[u8], limits: ParseLimits) -> Result<Self> {
        let mut cursor = Cursor::with_limits(data, limits);
        let header = MdlHeader::parse(&mut cursor)?;
        let file = OffsetOrigin::Start(0);

        let bones = cursor.read_table(&header.bones, file, BONE, |c, _| Bone::parse(c))?;
        let skeleton = Skeleton::new(bones)?;
        let bone_count = skeleton.len();

        let attachments = cursor.read_table(&header.attachments, file, ATTACHMENT, |c, _| {
            Attachment::parse(c, bone_count)
        })?;
        let pose_parameters = cursor.read_table(&header.pose_params, file, POSE_PARAMETER, |c, _| {
            PoseParameter::parse(c)
        })?;
        let anim_blocks =
            cursor.read_table(&header.anim_blocks, file, ANIM_BLOCK, |c, _| AnimBlock::parse(c))?;

        let animations = cursor.read_table(&header.local_anims, file, ANIM_DESC, |c, _| {
            AnimDesc::parse(c, bone_count)
        })?;
        let anim_count = animations.len();
        let sequences = cursor.read_table(&header.local_seqs, file, SEQ_DESC, |c, _| {
            SeqDesc::parse(c, bone_count, anim_count)
        })?;

        let textures = cursor.read_table(&header.textures, file, TEXTURE, |c, _| Texture::parse(c))?;
        let texture_dirs = read_texture_dirs(&mut cursor, &header.texture_dirs)?;
        let skin_table = SkinTable::parse(
            &mut cursor,
            header.skin_family_count,
            header.skin_reference_count,
            header.skin_family_offset,
            textures.len(),
        )?;

        let body_parts =
            cursor.read_table(&header.body_parts, file, BODY_PART, |c, _| BodyPart::parse(c))?;

        log::debug!(
            "Parsed MDL '{}': {} bones ({} roots), {} anims, {} sequences, {} body parts",
            header.name,
            skeleton.len(),
            skeleton.roots().len(),
            animations.len(),
            sequences.len(),
            body_parts.len()
        );

        Ok(Self {
            header,
            skeleton,
            attachments,
            pose_parameters,
            anim_blocks,
            animations,
            sequences,
            textures,
            texture_dirs,
            skin_table,
            body_parts,
        })
    }

    /// Load an MDL file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    pub fn bones(&self) -> &[Bone] {
        self.skeleton.bones()
    }

    /// Look up an animation by name
    pub fn animation(&self, name: &str) -> Option<&AnimDesc> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Look up a sequence by label
    pub fn sequence(&self, label: &str) -> Option<&SeqDesc> {
        self.sequences.iter().find(|s| s.label == label)
    }

    /// Texture used by a mesh material slot under a skin family
    pub fn texture_for(&self, family: usize, material: usize) -> Option<&Texture> {
        self.textures.get(self.skin_table.texture(family, material)?)
    }

    /// Local pose of every bone for an animation frame, `None` when that frame
    /// is streamed from an external block
    pub fn pose(&self, animation: usize, frame: u32) -> Result<Option<Vec<BonePose>>> {
        match self.animations.get(animation) {
            Some(anim) => anim.pose(frame, &self.skeleton),
            None => Err(StudioError::InvalidReference {
                structure: "mdl",
                field: "animation",
                value: animation as i64,
                max: self.animations.len() as i64 - 1,
            }),
        }
    }
}
