//! # Source Engine Studio Model Decoder
//!
//! Decodes compiled studio models into a read-only object graph:
//!
//! - **MDL**: skeleton, attachments, animations, sequences, materials and the
//!   body part / model / mesh hierarchy
//! - **VVD**: skinned vertices and tangents shared by every LOD, with fixups
//! - **VTX**: per-LOD render batches (strip groups, strips, indices)
//!
//! Every parse runs over an in-memory buffer with its own cursor and returns
//! either the complete graph or a [`StudioError`]; no partial result is ever
//! produced. Counts, frame budgets and string lengths are bounded by
//! [`ParseLimits`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use studio_model::{Mdl, StudioModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mdl = Mdl::load("models/props/crate01.mdl")?;
//! println!("{} v{}", mdl.header.name, mdl.header.version);
//! for root in mdl.skeleton.roots() {
//!     println!("root bone: {}", mdl.skeleton.bones()[*root].name);
//! }
//!
//! // Sample the first frame of the first animation
//! if let Some(pose) = mdl.pose(0, 0)? {
//!     println!("{} bones posed", pose.len());
//! }
//!
//! // Load the companion VVD and VTX files and check they match
//! let model = StudioModel::load("models/props/crate01.mdl")?;
//! println!("{} vertices", model.vvd.vertices.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `serde-support`: derive `serde::Serialize` on the decoded graph

pub mod animation;
pub mod chunks;
pub mod common;
pub mod compressed;
pub mod cursor;
pub mod error;
pub mod header;
pub mod limits;
pub mod model;
pub mod studio;
pub mod version;
pub mod vtx;
pub mod vvd;

// Re-export common types
pub use animation::{BonePose, euler_to_quat};
pub use chunks::{AnimDesc, Bone, SeqDesc, Skeleton};
pub use cursor::Cursor;
pub use error::{Result, StudioError};
pub use header::{MdlFlags, MdlHeader};
pub use limits::ParseLimits;
pub use model::Mdl;
pub use studio::StudioModel;
pub use version::MdlVersion;
pub use vtx::Vtx;
pub use vvd::Vvd;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
