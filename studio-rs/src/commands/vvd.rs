//! VVD vertex file command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use studio_model::Vvd;

use crate::commands::print_json;

#[derive(Subcommand)]
pub enum VvdCommands {
    /// Display information about a VVD vertex file
    Info {
        /// Path to the VVD file
        file: PathBuf,

        /// Also list the vertices of this LOD
        #[arg(short, long)]
        lod: Option<usize>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(cmd: VvdCommands) -> Result<()> {
    match cmd {
        VvdCommands::Info { file, lod, json } => handle_info(&file, lod, json),
    }
}

fn handle_info(path: &Path, lod: Option<usize>, json: bool) -> Result<()> {
    let vvd = Vvd::load(path)
        .with_context(|| format!("Failed to load VVD file from {}", path.display()))?;

    let lod_vertices = match lod {
        Some(lod) => Some(
            vvd.lod_vertices(lod)
                .with_context(|| format!("LOD {lod} is not present in {}", path.display()))?,
        ),
        None => None,
    };

    if json {
        return match &lod_vertices {
            Some(vertices) => print_json(vertices),
            None => print_json(&vvd),
        };
    }

    let header = &vvd.header;
    println!("Loading VVD file: {}", path.display());
    println!("\n=== VVD Information ===");
    println!("Version: {}", header.version);
    println!("Checksum: {:#010x}", header.checksum);
    println!("LODs: {}", header.lod_count);
    for (i, count) in header.lod_vertex_counts.iter().take(header.lod_count).enumerate() {
        println!("  LOD {i}: {count} vertices");
    }
    println!("Vertices: {}", vvd.vertices.len());
    println!("Tangents: {}", vvd.tangents.len());
    println!("Fixups: {}", vvd.fixups.len());
    for fixup in &vvd.fixups {
        println!(
            "  lod {} <- vertices {}..{}",
            fixup.lod,
            fixup.source_vertex,
            u64::from(fixup.source_vertex) + u64::from(fixup.vertex_count)
        );
    }

    if let (Some(lod), Some(vertices)) = (lod, lod_vertices) {
        println!("\n=== LOD {lod} Vertices ===");
        for (i, vertex) in vertices.iter().enumerate() {
            let p = vertex.position;
            let influences: Vec<String> = vertex
                .bone_weights
                .influences()
                .map(|(bone, weight)| format!("{bone}:{weight:.2}"))
                .collect();
            println!(
                "  [{i}] ({:.3}, {:.3}, {:.3}) uv ({:.3}, {:.3}) bones [{}]",
                p.x,
                p.y,
                p.z,
                vertex.uv.x,
                vertex.uv.y,
                influences.join(", ")
            );
        }
    }

    Ok(())
}
