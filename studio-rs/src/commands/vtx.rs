//! VTX render batch command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use studio_model::{MdlVersion, Vtx};

use crate::commands::print_json;
use crate::utils::{NodeType, TreeNode, TreeOptions, render_tree};

#[derive(Subcommand)]
pub enum VtxCommands {
    /// Display information about a VTX file
    Info {
        /// Path to the VTX file
        file: PathBuf,

        /// Version of the MDL the file belongs to (49 adds topology data)
        #[arg(short = 'm', long, default_value = "48")]
        mdl_version: i32,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display VTX file structure as a tree
    Tree {
        /// Path to the VTX file
        file: PathBuf,

        /// Version of the MDL the file belongs to (49 adds topology data)
        #[arg(short = 'm', long, default_value = "48")]
        mdl_version: i32,

        /// Maximum depth to display
        #[arg(short, long, default_value = "6")]
        depth: usize,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

pub fn execute(cmd: VtxCommands) -> Result<()> {
    match cmd {
        VtxCommands::Info {
            file,
            mdl_version,
            json,
        } => handle_info(&file, mdl_version, json),
        VtxCommands::Tree {
            file,
            mdl_version,
            depth,
            no_color,
        } => {
            let options = TreeOptions {
                max_depth: Some(depth),
                no_color,
                ..TreeOptions::default()
            };
            handle_tree(&file, mdl_version, &options)
        }
    }
}

fn load(path: &Path, mdl_version: i32) -> Result<Vtx> {
    let version = MdlVersion::parse(mdl_version)?;
    Vtx::load(path, version)
        .with_context(|| format!("Failed to load VTX file from {}", path.display()))
}

fn handle_info(path: &Path, mdl_version: i32, json: bool) -> Result<()> {
    let vtx = load(path, mdl_version)?;
    if json {
        return print_json(&vtx);
    }

    let header = &vtx.header;
    println!("Loading VTX file: {}", path.display());
    println!("\n=== VTX Information ===");
    println!("Version: {}", header.version);
    println!("Checksum: {:#010x}", header.checksum);
    println!("Vertex cache size: {}", header.vertex_cache_size);
    println!(
        "Max bones: {} per strip, {} per triangle, {} per vertex",
        header.max_bones_per_strip, header.max_bones_per_triangle, header.max_bones_per_vertex
    );
    println!("LODs: {}", header.lod_count);
    println!("Body parts: {}", vtx.body_parts.len());

    let mut strip_groups = 0;
    let mut strips = 0;
    let mut triangles = 0;
    for mesh in vtx
        .body_parts
        .iter()
        .flat_map(|part| &part.models)
        .flat_map(|model| &model.lods)
        .flat_map(|lod| &lod.meshes)
    {
        strip_groups += mesh.strip_groups.len();
        for group in &mesh.strip_groups {
            strips += group.strips.len();
            triangles += group.triangles().len();
        }
    }
    println!("Strip groups: {strip_groups}");
    println!("Strips: {strips}");
    println!("Triangles (all LODs): {triangles}");

    for (lod, list) in vtx.material_replacements.iter().enumerate() {
        for replacement in list {
            println!(
                "LOD {lod} replaces material {} with {}",
                replacement.material, replacement.name
            );
        }
    }
    Ok(())
}

fn handle_tree(path: &Path, mdl_version: i32, options: &TreeOptions) -> Result<()> {
    let vtx = load(path, mdl_version)?;

    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let root = TreeNode::new(file_name, NodeType::Root)
        .with_metadata("checksum", format!("{:#010x}", vtx.header.checksum))
        .with_metadata("lods", vtx.header.lod_count)
        .add_children(vtx.body_parts.iter().enumerate().map(|(b, part)| {
            TreeNode::new(format!("body part {b}"), NodeType::Table).add_children(
                part.models.iter().enumerate().map(|(m, model)| {
                    TreeNode::new(format!("model {m}"), NodeType::Data).add_children(
                        model.lods.iter().enumerate().map(|(l, lod)| {
                            TreeNode::new(format!("lod {l}"), NodeType::Data)
                                .with_metadata("switch_point", lod.switch_point)
                                .add_children(lod.meshes.iter().enumerate().map(|(i, mesh)| {
                                    mesh_node(i, mesh)
                                }))
                        }),
                    )
                }),
            )
        }));

    print!("{}", render_tree(&root, options));
    Ok(())
}

fn mesh_node(index: usize, mesh: &studio_model::vtx::VtxMesh) -> TreeNode {
    TreeNode::new(format!("mesh {index}"), NodeType::Mesh)
        .with_metadata("flags", format!("{:?}", mesh.flags))
        .add_children(mesh.strip_groups.iter().enumerate().map(|(g, group)| {
            TreeNode::new(format!("strip group {g}"), NodeType::Data)
                .with_metadata("flags", format!("{:?}", group.flags))
                .with_metadata("vertices", group.vertices.len())
                .with_metadata("indices", group.indices.len())
                .with_metadata("strips", group.strips.len())
        }))
}
