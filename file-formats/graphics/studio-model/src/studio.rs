//! A model together with its vertex and render batch files

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StudioError};
use crate::model::Mdl;
use crate::vtx::Vtx;
use crate::vvd::Vvd;

/// Extensions tried, in order, for the render batch file next to an MDL
const VTX_EXTENSIONS: [&str; 3] = ["dx90.vtx", "dx80.vtx", "vtx"];

/// MDL, VVD and VTX files checked against each other
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct StudioModel {
    pub mdl: Mdl,
    pub vvd: Vvd,
    pub vtx: Vtx,
}

impl StudioModel {
    /// Bundle already parsed files.
    ///
    /// Fails when a companion checksum differs from the model's or the VTX
    /// hierarchy does not mirror the model's body parts, models and meshes at
    /// every LOD.
    pub fn new(mdl: Mdl, vvd: Vvd, vtx: Vtx) -> Result<Self> {
        let expected = mdl.header.checksum;
        for (format, actual) in [("VVD", vvd.checksum()), ("VTX", vtx.checksum())] {
            if actual != expected {
                return Err(StudioError::ChecksumMismatch {
                    format,
                    expected,
                    actual,
                });
            }
        }

        let model = Self { mdl, vvd, vtx };
        model.check_hierarchy()?;
        Ok(model)
    }

    /// Parse and bundle the three files from memory
    pub fn from_bytes(mdl: &[u8], vvd: &[u8], vtx: &[u8]) -> Result<Self> {
        let mdl = Mdl::parse(mdl)?;
        let vvd = Vvd::parse(vvd)?;
        let vtx = Vtx::parse(vtx, mdl.header.version)?;
        Self::new(mdl, vvd, vtx)
    }

    /// Load an MDL file and the VVD and VTX files stored next to it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mdl = fs::read(path)?;
        let vvd = fs::read(path.with_extension("vvd"))?;
        let vtx = fs::read(find_vtx(path)?)?;
        Self::from_bytes(&mdl, &vvd, &vtx)
    }

    fn check_hierarchy(&self) -> Result<()> {
        let mismatch = |structure, index: String, expected, actual| {
            Err(StudioError::HierarchyMismatch {
                structure,
                index,
                expected,
                actual,
            })
        };

        let lod_count = self.vtx.header.lod_count.max(0) as usize;
        let parts = &self.mdl.body_parts;
        if parts.len() != self.vtx.body_parts.len() {
            return mismatch(
                "body parts",
                "file".to_string(),
                parts.len(),
                self.vtx.body_parts.len(),
            );
        }

        for (b, (part, vtx_part)) in parts.iter().zip(&self.vtx.body_parts).enumerate() {
            if part.models.len() != vtx_part.models.len() {
                return mismatch(
                    "models",
                    format!("body part {b}"),
                    part.models.len(),
                    vtx_part.models.len(),
                );
            }
            for (m, (model, vtx_model)) in part.models.iter().zip(&vtx_part.models).enumerate() {
                if vtx_model.lods.len() != lod_count {
                    return mismatch(
                        "lods",
                        format!("body part {b} model {m}"),
                        lod_count,
                        vtx_model.lods.len(),
                    );
                }
                for (l, lod) in vtx_model.lods.iter().enumerate() {
                    if lod.meshes.len() != model.meshes.len() {
                        return mismatch(
                            "meshes",
                            format!("body part {b} model {m} lod {l}"),
                            model.meshes.len(),
                            lod.meshes.len(),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Triangles of one mesh at one LOD as indices into
    /// [`Vvd::lod_vertices`] for the same LOD
    pub fn mesh_triangles(
        &self,
        body_part: usize,
        model: usize,
        lod: usize,
        mesh: usize,
    ) -> Result<Vec<[usize; 3]>> {
        let reference = |field, value: usize, max: usize| StudioError::InvalidReference {
            structure: "studio model",
            field,
            value: value as i64,
            max: max as i64 - 1,
        };

        let parts = &self.mdl.body_parts;
        let part = parts
            .get(body_part)
            .ok_or_else(|| reference("body_part", body_part, parts.len()))?;
        let mdl_model = part
            .models
            .get(model)
            .ok_or_else(|| reference("model", model, part.models.len()))?;
        let mdl_mesh = mdl_model
            .meshes
            .get(mesh)
            .ok_or_else(|| reference("mesh", mesh, mdl_model.meshes.len()))?;

        let lods = self
            .vtx
            .body_parts
            .get(body_part)
            .and_then(|p| p.models.get(model))
            .map_or(&[][..], |m| m.lods.as_slice());
        let vtx_mesh = lods
            .get(lod)
            .ok_or_else(|| reference("lod", lod, lods.len()))?
            .meshes
            .get(mesh)
            .ok_or_else(|| reference("mesh", mesh, mdl_model.meshes.len()))?;

        let vertex_count = self
            .vvd
            .lod_vertices(lod)
            .map_or(0, |vertices| vertices.len());
        let base = mdl_model.first_vertex() + mdl_mesh.vertex_offset.max(0) as usize;

        let mut triangles = Vec::new();
        for group in &vtx_mesh.strip_groups {
            for triangle in group.triangles() {
                let mut resolved = [0usize; 3];
                for (out, index) in resolved.iter_mut().zip(triangle) {
                    let vertex = group
                        .vertices
                        .get(index as usize)
                        .map_or(usize::MAX, |v| base + v.original_mesh_vertex as usize);
                    if vertex >= vertex_count {
                        return Err(reference("vertex", vertex, vertex_count));
                    }
                    *out = vertex;
                }
                triangles.push(resolved);
            }
        }
        Ok(triangles)
    }
}

fn find_vtx(mdl_path: &Path) -> Result<PathBuf> {
    VTX_EXTENSIONS
        .iter()
        .map(|ext| mdl_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            StudioError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no VTX file next to {}", mdl_path.display()),
            ))
        })
}
