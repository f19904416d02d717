//! Root CLI structure for studio-rs

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "studio-rs")]
#[command(about = "Command-line tools for Source engine studio models", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// MDL model operations
    Mdl {
        #[command(subcommand)]
        command: crate::commands::mdl::MdlCommands,
    },

    /// VVD vertex file operations
    Vvd {
        #[command(subcommand)]
        command: crate::commands::vvd::VvdCommands,
    },

    /// VTX render batch operations
    Vtx {
        #[command(subcommand)]
        command: crate::commands::vtx::VtxCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
