//! Shared utilities for the studio-rs CLI

pub mod tree;

pub use tree::{NodeType, TreeNode, TreeOptions, format_bytes, render_tree};
