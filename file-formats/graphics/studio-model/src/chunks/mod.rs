pub mod anim_value;
pub mod animation;
pub mod attachment;
pub mod body_part;
pub mod bone;
pub mod sequence;
pub mod texture;

// Re-export common types
pub use anim_value::{AnimValueChain, AnimValueRun, AnimValueTrack};
pub use animation::{
    Anim, AnimBlock, AnimDesc, AnimDescFlags, AnimFlags, AnimPosition, AnimRotation, AnimSection,
    Movement,
};
pub use attachment::{Attachment, PoseParameter};
pub use body_part::{BodyPart, Mesh, Model};
pub use bone::{Bone, BoneFlags, Skeleton};
pub use sequence::{Event, SeqDesc};
pub use texture::{SkinTable, Texture};
