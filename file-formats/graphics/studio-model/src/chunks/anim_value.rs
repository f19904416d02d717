//! Run-length encoded keyframe values
//!
//! A chain is a sequence of contiguous runs. Each run stores `valid` explicit
//! values and spans `total` frames; frames past the explicit values repeat the
//! last one.

use glam::Vec3;

use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

/// One run of a value chain
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimValueRun {
    pub valid: u8,
    pub total: u8,
    pub values: Vec<i16>,
}

impl AnimValueRun {
    /// Value of a frame local to this run
    pub fn value_at(&self, frame: u32) -> i16 {
        let index = (frame as usize).min(self.values.len().saturating_sub(1));
        self.values.get(index).copied().unwrap_or(0)
    }
}

/// A chain of runs covering at least the frame count it was read for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimValueChain {
    runs: Vec<AnimValueRun>,
}

impl AnimValueChain {
    /// Read runs at the cursor until their spans cover `frame_count` frames
    pub fn parse(cursor: &mut Cursor<'_>, frame_count: u32) -> Result<Self> {
        let mut runs = Vec::new();
        let mut budget = frame_count as i64;

        while budget > 0 {
            let offset = cursor.position();
            let valid = cursor.read_u8()?;
            let total = cursor.read_u8()?;
            if total == 0 || valid == 0 || valid > total {
                return Err(StudioError::InvalidRunLength {
                    offset,
                    valid,
                    total,
                });
            }
            let values = (0..valid)
                .map(|_| cursor.read_i16())
                .collect::<Result<Vec<_>>>()?;
            budget -= total as i64;
            runs.push(AnimValueRun {
                valid,
                total,
                values,
            });
        }

        Ok(Self { runs })
    }

    pub fn runs(&self) -> &[AnimValueRun] {
        &self.runs
    }

    /// Total frames covered by all runs
    pub fn frame_span(&self) -> u32 {
        self.runs.iter().map(|r| r.total as u32).sum()
    }

    /// Raw fixed-point value at a frame.
    ///
    /// Frames past the end of the chain hold the final value.
    pub fn value_at(&self, frame: u32) -> i16 {
        let mut k = frame;
        for run in &self.runs {
            if k < run.total as u32 {
                return run.value_at(k);
            }
            k -= run.total as u32;
        }
        self.runs.last().map_or(0, |r| r.value_at(u32::MAX))
    }
}

/// Per-axis value chains for a keyed rotation or position
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct AnimValueTrack {
    pub axes: [Option<AnimValueChain>; 3],
}

impl AnimValueTrack {
    /// On-disk size of the three-entry pointer table
    pub const POINTER_TABLE_SIZE: usize = 6;

    /// Read the pointer table at the cursor and the chains it names.
    ///
    /// Each pointer is relative to the start of the table; zero means the axis
    /// is constant zero. The cursor is left just past the table.
    pub fn parse(cursor: &mut Cursor<'_>, frame_count: u32) -> Result<Self> {
        let start = cursor.position();
        let offsets = [cursor.read_i16()?, cursor.read_i16()?, cursor.read_i16()?];
        let end = start + Self::POINTER_TABLE_SIZE as u64;

        let mut axes: [Option<AnimValueChain>; 3] = Default::default();
        for (axis, &offset) in axes.iter_mut().zip(&offsets) {
            if offset == 0 {
                continue;
            }
            let chain_start = cursor.resolve(start, offset as i64, "anim value", "offset")?;
            cursor.seek(chain_start)?;
            let chain = AnimValueChain::parse(cursor, frame_count);
            cursor.seek(end)?;
            *axis = Some(chain?);
        }

        Ok(Self { axes })
    }

    /// Raw per-axis values at a frame, zero for absent axes
    pub fn sample(&self, frame: u32) -> Vec3 {
        let [x, y, z] = self
            .axes
            .each_ref()
            .map(|a| a.as_ref().map_or(0.0, |c| c.value_at(frame) as f32));
        Vec3::new(x, y, z)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(valid: u8, total: u8, values: &[i16]) -> Vec<u8> {
        let mut out = vec![valid, total];
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_two_run_chain() {
        let mut data = run(2, 4, &[10, 20]);
        data.extend(run(1, 1, &[5]));

        let mut cursor = Cursor::new(&data);
        let chain = AnimValueChain::parse(&mut cursor, 5).unwrap();
        assert_eq!(chain.runs().len(), 2);
        assert_eq!(chain.frame_span(), 5);
        assert_eq!(cursor.position(), data.len() as u64);

        let values: Vec<i16> = (0..5).map(|f| chain.value_at(f)).collect();
        assert_eq!(values, vec![10, 20, 20, 20, 5]);
    }

    #[test]
    fn test_stops_once_budget_met() {
        let mut data = run(1, 8, &[7]);
        // A second run that must never be read
        data.extend([0, 0]);

        let chain = AnimValueChain::parse(&mut Cursor::new(&data), 3).unwrap();
        assert_eq!(chain.runs().len(), 1);
        assert!(chain.frame_span() >= 3);
    }

    #[test]
    fn test_zero_frames_reads_nothing() {
        let chain = AnimValueChain::parse(&mut Cursor::new(&[]), 0).unwrap();
        assert!(chain.runs().is_empty());
        assert_eq!(chain.value_at(3), 0);
    }

    #[test]
    fn test_rejects_bad_runs() {
        for bad in [[0u8, 0], [1, 0], [0, 3], [4, 2]] {
            let err = AnimValueChain::parse(&mut Cursor::new(&bad), 2).unwrap_err();
            assert!(
                matches!(err, StudioError::InvalidRunLength { offset: 0, .. }),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_value_past_end_holds() {
        let data = run(2, 2, &[1, 2]);
        let chain = AnimValueChain::parse(&mut Cursor::new(&data), 2).unwrap();
        assert_eq!(chain.value_at(10), 2);
    }

    #[test]
    fn test_track_pointers() {
        // Table at 0: x -> 6, y absent, z -> 10
        let mut data = Vec::new();
        data.extend_from_slice(&6i16.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&10i16.to_le_bytes());
        data.extend(run(1, 2, &[100]));
        data.extend(run(1, 2, &[-50]));

        let mut cursor = Cursor::new(&data);
        let track = AnimValueTrack::parse(&mut cursor, 2).unwrap();
        assert_eq!(cursor.position(), AnimValueTrack::POINTER_TABLE_SIZE as u64);
        assert!(track.axes[1].is_none());
        assert_eq!(track.sample(1), Vec3::new(100.0, 0.0, -50.0));
    }

    #[test]
    fn test_track_pointer_out_of_range() {
        let mut data = Vec::new();
        data.extend_from_slice(&200i16.to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        let mut cursor = Cursor::new(&data);
        assert!(matches!(
            AnimValueTrack::parse(&mut cursor, 1),
            Err(StudioError::OffsetOutOfRange { .. })
        ));
    }
}
