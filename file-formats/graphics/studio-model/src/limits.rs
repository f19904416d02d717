//! Caller-side ceilings applied while decoding untrusted input

/// Upper bounds checked before any table is allocated or any chain is walked.
///
/// The defaults comfortably cover shipped game assets; tighten them when
/// decoding files from untrusted sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct ParseLimits {
    /// Maximum element count of any `(count, offset)` table
    pub max_table_count: u32,
    /// Maximum frame count of an animation or section
    pub max_frame_count: u32,
    /// Maximum number of anim records chained in one section
    pub max_anim_records: u32,
    /// Maximum length of a NUL-terminated string
    pub max_string_len: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_table_count: 1 << 20,
            max_frame_count: 1 << 16,
            max_anim_records: 256,
            max_string_len: 4096,
        }
    }
}

impl ParseLimits {
    /// Limits sized for small hand-built test assets
    pub fn strict() -> Self {
        Self {
            max_table_count: 4096,
            max_frame_count: 4096,
            max_anim_records: 256,
            max_string_len: 256,
        }
    }
}
