//! Sampling decoded animation data into per-bone local transforms

use glam::{Affine3A, Quat, Vec3};

use crate::chunks::animation::{
    Anim, AnimDesc, AnimDescFlags, AnimFlags, AnimPosition, AnimRotation,
};
use crate::chunks::bone::{Bone, Skeleton};
use crate::error::{Result, StudioError};

/// Local transform of one bone at one frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// The bone's rest transform
    pub fn rest(bone: &Bone) -> Self {
        Self {
            position: bone.position,
            rotation: bone.rotation,
        }
    }

    pub fn local_transform(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.position)
    }
}

/// Convert Euler angles in radians (roll about x, pitch about y, yaw about z)
/// to a quaternion
pub fn euler_to_quat(angles: Vec3) -> Quat {
    let (sr, cr) = (angles.x * 0.5).sin_cos();
    let (sp, cp) = (angles.y * 0.5).sin_cos();
    let (sy, cy) = (angles.z * 0.5).sin_cos();

    let sr_cp = sr * cp;
    let cr_sp = cr * sp;
    let cr_cp = cr * cp;
    let sr_sp = sr * sp;

    Quat::from_xyzw(
        sr_cp * cy - cr_sp * sy,
        cr_sp * cy + sr_cp * sy,
        cr_cp * sy - sr_sp * cy,
        cr_cp * cy + sr_sp * sy,
    )
}

impl AnimDesc {
    /// Section slot and section-local frame holding `frame`.
    ///
    /// The final frame of a sectioned clip longer than one section is stored
    /// at the start of the trailing section.
    pub fn section_for_frame(&self, frame: u32) -> Option<(usize, u32)> {
        if frame >= self.frame_count {
            return None;
        }
        if self.section_frames == 0 {
            return Some((0, frame));
        }
        if self.frame_count > self.section_frames && frame == self.frame_count - 1 {
            return Some(((self.frame_count / self.section_frames + 1) as usize, 0));
        }
        let section = frame / self.section_frames;
        Some((section as usize, frame - section * self.section_frames))
    }

    /// Local pose of every bone at a frame.
    ///
    /// Returns `Ok(None)` when the frame lives in a section streamed from an
    /// external animation block. When the frame count is a multiple of the
    /// section span the trailing section is read for zero frames, so sampling
    /// the final frame from keyed data fails with [`StudioError::EmptySection`].
    pub fn pose(&self, frame: u32, skeleton: &Skeleton) -> Result<Option<Vec<BonePose>>> {
        let (section, local_frame) = self.section_for_frame(frame).ok_or(
            StudioError::InvalidReference {
                structure: "anim desc",
                field: "frame",
                value: frame as i64,
                max: self.frame_count as i64 - 1,
            },
        )?;

        let delta = self.flags.contains(AnimDescFlags::DELTA);
        let mut pose: Vec<BonePose> = skeleton
            .bones()
            .iter()
            .map(|bone| if delta { BonePose::IDENTITY } else { BonePose::rest(bone) })
            .collect();

        if self.flags.contains(AnimDescFlags::ALL_ZEROS) {
            return Ok(Some(pose));
        }

        let Some(slot) = self.sections.get(section) else {
            return Ok(Some(pose));
        };
        let Some(anims) = &slot.anims else {
            return Ok(None);
        };
        if slot.frame_count == 0 && anims.iter().any(Anim::is_keyed) {
            return Err(StudioError::EmptySection {
                animation: self.name.clone(),
                frame,
                section,
            });
        }

        for anim in anims {
            let index = anim.bone as usize;
            let (Some(bone), Some(out)) = (skeleton.get(index), pose.get_mut(index)) else {
                return Err(StudioError::InvalidReference {
                    structure: "anim",
                    field: "bone",
                    value: index as i64,
                    max: skeleton.len() as i64 - 1,
                });
            };
            let anim_delta = anim.flags.contains(AnimFlags::DELTA);

            out.rotation = match &anim.rotation {
                Some(AnimRotation::Raw(q)) => *q,
                Some(AnimRotation::Keyed(track)) => {
                    let mut angles = track.sample(local_frame) * bone.rotation_scale;
                    if !anim_delta {
                        angles += bone.euler;
                    }
                    euler_to_quat(angles)
                }
                None if anim_delta => Quat::IDENTITY,
                None => bone.rotation,
            };

            out.position = match &anim.position {
                Some(AnimPosition::Raw(p)) => *p,
                Some(AnimPosition::Keyed(track)) => {
                    let mut position = track.sample(local_frame) * bone.position_scale;
                    if !anim_delta {
                        position += bone.position;
                    }
                    position
                }
                None if anim_delta => Vec3::ZERO,
                None => bone.position,
            };
        }

        Ok(Some(pose))
    }
}
