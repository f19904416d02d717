//! MDL model command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use studio_model::chunks::AnimDesc;
use studio_model::{Mdl, StudioModel};

use crate::commands::print_json;
use crate::utils::{NodeType, TreeNode, TreeOptions, format_bytes, render_tree};

#[derive(Subcommand)]
pub enum MdlCommands {
    /// Display information about an MDL model file
    Info {
        /// Path to the MDL file
        file: PathBuf,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        /// Print the whole decoded model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display MDL file structure as a tree
    Tree {
        /// Path to the MDL file
        file: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "5")]
        depth: usize,

        /// Show metadata inline
        #[arg(short, long)]
        compact: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Hide referenced material and animation files
        #[arg(long)]
        no_refs: bool,
    },

    /// Print the bone hierarchy
    Bones {
        /// Path to the MDL file
        file: PathBuf,

        /// Show model-space rest positions instead of parent-relative ones
        #[arg(short, long)]
        world: bool,
    },

    /// List animations, or sample one animation at a frame
    Anims {
        /// Path to the MDL file
        file: PathBuf,

        /// Animation name or index to sample
        #[arg(short, long)]
        anim: Option<String>,

        /// Frame to sample
        #[arg(short, long, default_value = "0")]
        frame: u32,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the model with its VVD and VTX files and check they match
    Check {
        /// Path to the MDL file
        file: PathBuf,
    },
}

pub fn execute(cmd: MdlCommands) -> Result<()> {
    match cmd {
        MdlCommands::Info {
            file,
            detailed,
            json,
        } => handle_info(&file, detailed, json),
        MdlCommands::Tree {
            file,
            depth,
            compact,
            no_color,
            no_refs,
        } => {
            let options = TreeOptions {
                max_depth: Some(depth),
                show_external_refs: !no_refs,
                no_color,
                show_metadata: true,
                compact,
            };
            handle_tree(&file, &options)
        }
        MdlCommands::Bones { file, world } => handle_bones(&file, world),
        MdlCommands::Anims {
            file,
            anim,
            frame,
            json,
        } => handle_anims(&file, anim.as_deref(), frame, json),
        MdlCommands::Check { file } => handle_check(&file),
    }
}

fn load(path: &Path) -> Result<Mdl> {
    Mdl::load(path).with_context(|| format!("Failed to load MDL model from {}", path.display()))
}

fn handle_info(path: &Path, detailed: bool, json: bool) -> Result<()> {
    let mdl = load(path)?;
    if json {
        return print_json(&mdl);
    }

    let header = &mdl.header;
    println!("Loading MDL model: {}", path.display());
    println!("\n=== MDL Model Information ===");
    println!("Name: {}", header.name);
    println!("Version: {}", header.version);
    println!("Checksum: {:#010x}", header.checksum);
    println!("Flags: {:?}", header.flags);
    println!(
        "Bones: {} ({} roots)",
        mdl.skeleton.len(),
        mdl.skeleton.roots().len()
    );
    println!("Attachments: {}", mdl.attachments.len());
    println!("Pose parameters: {}", mdl.pose_parameters.len());
    println!("Animations: {}", mdl.animations.len());
    println!("Sequences: {}", mdl.sequences.len());
    println!("Textures: {}", mdl.textures.len());
    println!(
        "Skin families: {} x {} references",
        mdl.skin_table.family_count(),
        mdl.skin_table.reference_count()
    );
    println!("Body parts: {}", mdl.body_parts.len());
    if !header.surface_prop.is_empty() {
        println!("Surface prop: {}", header.surface_prop);
    }
    if header.has_anim_blocks() {
        println!(
            "Animation blocks: {} in {}",
            mdl.anim_blocks.len(),
            header.anim_block_name
        );
    }

    if detailed {
        println!("\n=== Detailed Information ===");
        println!("Eye position: {}", header.eye_position);
        println!("Hull: {} .. {}", header.hull_min, header.hull_max);
        println!("View bounds: {} .. {}", header.view_bb_min, header.view_bb_max);
        println!("Mass: {}", header.mass);

        println!("\nMaterial directories:");
        for dir in &mdl.texture_dirs {
            println!("  {dir}");
        }
        println!("\nMaterials:");
        for (i, texture) in mdl.textures.iter().enumerate() {
            println!("  [{i}] {}", texture.name);
        }

        println!("\nBody parts:");
        for part in &mdl.body_parts {
            println!("  {} (base {})", part.name, part.base);
            for model in &part.models {
                println!(
                    "    {}: {} vertices, {} meshes, radius {}",
                    model.name,
                    model.vertex_count,
                    model.meshes.len(),
                    model.bounding_radius
                );
            }
        }

        if !header.key_values.is_empty() {
            println!("\nKey values:\n{}", header.key_values);
        }
    }

    Ok(())
}

fn handle_tree(path: &Path, options: &TreeOptions) -> Result<()> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    let mdl = load(path)?;

    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let root = TreeNode::new(file_name, NodeType::Root)
        .with_size(size)
        .add_child(header_node(&mdl))
        .add_child(bones_node(&mdl))
        .add_child(animations_node(&mdl))
        .add_child(sequences_node(&mdl))
        .add_child(materials_node(&mdl))
        .add_child(body_parts_node(&mdl));

    print!("{}", render_tree(&root, options));
    Ok(())
}

fn header_node(mdl: &Mdl) -> TreeNode {
    let header = &mdl.header;
    let mut node = TreeNode::new("Header", NodeType::Header)
        .with_metadata("name", &header.name)
        .with_metadata("version", header.version)
        .with_metadata("checksum", format!("{:#010x}", header.checksum));
    if !header.surface_prop.is_empty() {
        node = node.with_metadata("surface_prop", &header.surface_prop);
    }
    if header.has_anim_blocks() {
        node = node.with_external_ref(&header.anim_block_name);
    }
    node
}

fn bones_node(mdl: &Mdl) -> TreeNode {
    fn bone_node(mdl: &Mdl, index: usize) -> TreeNode {
        let bones = mdl.skeleton.bones();
        let bone = &bones[index];
        TreeNode::new(format!("[{index}] {}", bone.name), NodeType::Bone).add_children(
            bone.children()
                .iter()
                .map(|&child| bone_node(mdl, child)),
        )
    }

    TreeNode::new("Bones", NodeType::Table)
        .with_metadata("count", mdl.skeleton.len())
        .add_children(mdl.skeleton.roots().iter().map(|&root| bone_node(mdl, root)))
}

fn animations_node(mdl: &Mdl) -> TreeNode {
    TreeNode::new("Animations", NodeType::Table)
        .with_metadata("count", mdl.animations.len())
        .add_children(mdl.animations.iter().map(|anim| {
            let mut node = TreeNode::new(&anim.name, NodeType::Animation)
                .with_metadata("frames", anim.frame_count)
                .with_metadata("fps", anim.fps);
            if !anim.sections.is_empty() {
                node = node.with_metadata("sections", section_summary(anim));
            }
            node
        }))
}

fn sequences_node(mdl: &Mdl) -> TreeNode {
    TreeNode::new("Sequences", NodeType::Table)
        .with_metadata("count", mdl.sequences.len())
        .add_children(mdl.sequences.iter().map(|seq| {
            let mut node = TreeNode::new(&seq.label, NodeType::Animation)
                .with_metadata("blend", format!("{}x{}", seq.group_size[0], seq.group_size[1]));
            if !seq.activity_name.is_empty() {
                node = node.with_metadata("activity", &seq.activity_name);
            }
            node
        }))
}

fn materials_node(mdl: &Mdl) -> TreeNode {
    let mut node = TreeNode::new("Materials", NodeType::Table)
        .with_metadata("count", mdl.textures.len())
        .with_metadata("skin_families", mdl.skin_table.family_count());
    for texture in &mdl.textures {
        for dir in &mdl.texture_dirs {
            node = node.with_external_ref(&format!("materials/{dir}{}.vmt", texture.name));
        }
    }
    node
}

fn body_parts_node(mdl: &Mdl) -> TreeNode {
    TreeNode::new("Body Parts", NodeType::Table)
        .with_metadata("count", mdl.body_parts.len())
        .add_children(mdl.body_parts.iter().map(|part| {
            TreeNode::new(&part.name, NodeType::Data)
                .with_metadata("base", part.base)
                .add_children(part.models.iter().map(|model| {
                    TreeNode::new(&model.name, NodeType::Data)
                        .with_metadata("vertices", model.vertex_count)
                        .add_children(model.meshes.iter().enumerate().map(|(i, mesh)| {
                            TreeNode::new(format!("mesh {i}"), NodeType::Mesh)
                                .with_metadata("material", mesh.material)
                                .with_metadata("vertices", mesh.vertex_count)
                        }))
                }))
        }))
}

fn section_summary(anim: &AnimDesc) -> String {
    let external = anim.sections.iter().filter(|s| !s.is_local()).count();
    format!(
        "{} x {} frames ({} external)",
        anim.sections.len(),
        anim.section_frames,
        external
    )
}

fn handle_bones(path: &Path, world: bool) -> Result<()> {
    let mdl = load(path)?;
    let skeleton = &mdl.skeleton;
    let world_transforms = world.then(|| skeleton.rest_world_transforms());

    for index in skeleton.depth_first() {
        let bone = &skeleton.bones()[index];
        let (x, y, z) = match &world_transforms {
            Some(transforms) => {
                let t = transforms[index].translation;
                (t.x, t.y, t.z)
            }
            None => (bone.position.x, bone.position.y, bone.position.z),
        };
        println!(
            "{}[{index}] {} ({x:.3}, {y:.3}, {z:.3})",
            "  ".repeat(skeleton.depth(index)),
            bone.name
        );
    }
    Ok(())
}

fn handle_anims(path: &Path, anim: Option<&str>, frame: u32, json: bool) -> Result<()> {
    let mdl = load(path)?;

    let Some(selector) = anim else {
        if json {
            return print_json(&mdl.animations);
        }
        println!("{:<4} {:<32} {:>7} {:>6}  sections", "#", "name", "frames", "fps");
        for (i, anim) in mdl.animations.iter().enumerate() {
            let sections = if anim.sections.is_empty() {
                "-".to_string()
            } else {
                section_summary(anim)
            };
            println!(
                "{:<4} {:<32} {:>7} {:>6.1}  {}",
                i, anim.name, anim.frame_count, anim.fps, sections
            );
        }
        return Ok(());
    };

    let index = match selector.parse::<usize>() {
        Ok(index) if index < mdl.animations.len() => index,
        _ => match mdl.animations.iter().position(|a| a.name == selector) {
            Some(index) => index,
            None => bail!("No animation named '{selector}' in {}", path.display()),
        },
    };
    let desc = &mdl.animations[index];

    let Some(pose) = mdl
        .pose(index, frame)
        .with_context(|| format!("Failed to sample '{}' at frame {frame}", desc.name))?
    else {
        let block = desc
            .section_for_frame(frame)
            .and_then(|(section, _)| desc.sections.get(section))
            .map_or(0, |s| s.anim_block);
        println!(
            "Frame {frame} of '{}' is stored in external animation block {block}",
            desc.name
        );
        return Ok(());
    };

    if json {
        return print_json(&pose);
    }

    println!("'{}' frame {frame}/{}", desc.name, desc.frame_count);
    for (bone, bone_pose) in mdl.skeleton.bones().iter().zip(&pose) {
        let p = bone_pose.position;
        let q = bone_pose.rotation;
        println!(
            "  {:<24} pos ({:.3}, {:.3}, {:.3}) rot ({:.4}, {:.4}, {:.4}, {:.4})",
            bone.name, p.x, p.y, p.z, q.x, q.y, q.z, q.w
        );
    }
    Ok(())
}

fn handle_check(path: &Path) -> Result<()> {
    let model = StudioModel::load(path)
        .with_context(|| format!("Failed to load model files next to {}", path.display()))?;

    println!(
        "✓ {}: MDL, VVD and VTX match (checksum {:#010x})",
        path.display(),
        model.mdl.header.checksum
    );

    for (b, part) in model.vtx.body_parts.iter().enumerate() {
        for (m, vtx_model) in part.models.iter().enumerate() {
            for (l, lod) in vtx_model.lods.iter().enumerate() {
                let mut triangles = 0;
                for mesh in 0..lod.meshes.len() {
                    triangles += model.mesh_triangles(b, m, l, mesh)?.len();
                }
                println!("  body part {b} model {m} lod {l}: {triangles} triangles");
            }
        }
    }
    println!(
        "  vertex data: {}",
        format_bytes((model.vvd.vertices.len() * studio_model::vvd::VERTEX.size) as u64)
    );
    Ok(())
}
