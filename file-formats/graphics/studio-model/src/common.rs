//! Shared table addressing and small math types used by all three file kinds

use glam::{Affine3A, Mat3, Vec3};

use crate::cursor::Cursor;
use crate::error::{Result, StudioError};

/// A `(count, offset)` table descriptor as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct TableRef {
    /// Record kind holding the descriptor, used in error reports
    pub structure: &'static str,
    /// Descriptor field name, used in error reports
    pub field: &'static str,
    /// Number of elements
    pub count: i32,
    /// Stored offset, interpreted through an [`OffsetOrigin`]
    pub offset: i32,
    /// Absolute position of the stored count
    pub count_at: u64,
    /// Absolute position immediately after the stored pair
    pub pair_end: u64,
}

impl TableRef {
    /// Build a descriptor from fields that are not stored side by side.
    ///
    /// `count_at` is the absolute position of the field the count came from.
    pub fn new(
        structure: &'static str,
        field: &'static str,
        count: i32,
        offset: i32,
        count_at: u64,
    ) -> Self {
        Self {
            structure,
            field,
            count,
            offset,
            count_at,
            pair_end: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Where a stored table offset is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetOrigin {
    /// Measured from an absolute position, normally the enclosing record's start
    /// (zero for file-level tables)
    Start(u64),
    /// Measured from the end of the `(count, offset)` pair, less a fixed
    /// correction equal to the pair's distance from its record start
    PairEnd { back: u64 },
}

/// Name and on-disk stride of one table element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    pub size: usize,
}

impl RecordLayout {
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }
}

impl<'a> Cursor<'a> {
    /// Read an adjacent `(count: i32, offset: i32)` pair at the current position
    pub fn read_table_ref(
        &mut self,
        structure: &'static str,
        field: &'static str,
    ) -> Result<TableRef> {
        let count_at = self.position();
        let count = self.read_i32()?;
        let offset = self.read_i32()?;
        Ok(TableRef {
            structure,
            field,
            count,
            offset,
            count_at,
            pair_end: self.position(),
        })
    }

    /// Absolute start of a table, validated against the buffer
    pub fn table_start(&self, table: &TableRef, origin: OffsetOrigin) -> Result<u64> {
        let base = match origin {
            OffsetOrigin::Start(start) => start as i64,
            OffsetOrigin::PairEnd { back } => table.pair_end as i64 - back as i64,
        };
        let absolute = base + table.offset as i64;
        if absolute < 0 || absolute as u64 >= self.len() {
            return Err(StudioError::OffsetOutOfRange {
                structure: table.structure,
                field: table.field,
                offset: absolute,
                len: self.len(),
            });
        }
        Ok(absolute as u64)
    }

    /// Check a count stored at absolute position `at` against the table limit
    /// and convert it to a length
    pub fn checked_count(
        &self,
        structure: &'static str,
        field: &'static str,
        count: i32,
        at: u64,
    ) -> Result<usize> {
        if count < 0 {
            return Err(StudioError::InvalidCount {
                structure,
                field,
                count: count as i64,
                offset: at,
            });
        }
        let limit = self.limits().max_table_count;
        if count as u32 > limit {
            return Err(StudioError::LimitExceeded {
                structure,
                field,
                value: count as u64,
                limit: limit as u64,
            });
        }
        Ok(count as usize)
    }

    /// Read every record of a table.
    ///
    /// `read` is called once per element with the cursor placed at that
    /// element's start; it may leave the cursor anywhere because each element
    /// is reached by stride. The cursor position is the same on return as on
    /// entry, including on error.
    pub fn read_table<T, F>(
        &mut self,
        table: &TableRef,
        origin: OffsetOrigin,
        layout: RecordLayout,
        mut read: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&mut Cursor<'a>, usize) -> Result<T>,
    {
        let count = self.checked_count(table.structure, table.field, table.count, table.count_at)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let start = self.table_start(table, origin)?;
        let needed = count
            .checked_mul(layout.size)
            .filter(|&n| n as u64 <= self.len() - start)
            .ok_or(StudioError::TruncatedBuffer {
                structure: Some(layout.name),
                offset: start,
                needed: count.saturating_mul(layout.size),
                len: self.len(),
            })?;

        log::trace!(
            "{}.{}: {} x {} ({} bytes) at {:#x}",
            table.structure,
            table.field,
            count,
            layout.name,
            needed,
            start
        );

        let mark = self.mark();
        let result: Result<Vec<T>> = (0..count)
            .map(|i| {
                self.seek(start + (i * layout.size) as u64)?;
                read(self, i).map_err(|e| e.within(layout.name))
            })
            .collect();
        self.restore(mark);
        result
    }
}

/// A row-major 3x4 affine matrix as stored in bone and attachment records
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Matrix3x4(pub [[f32; 4]; 3]);

impl Matrix3x4 {
    pub const IDENTITY: Self = Self([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ]);

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.0[0][3], self.0[1][3], self.0[2][3])
    }

    /// Convert to a glam affine transform
    pub fn to_affine(&self) -> Affine3A {
        let m = &self.0;
        let basis = Mat3::from_cols(
            Vec3::new(m[0][0], m[1][0], m[2][0]),
            Vec3::new(m[0][1], m[1][1], m[2][1]),
            Vec3::new(m[0][2], m[1][2], m[2][2]),
        );
        Affine3A::from_mat3_translation(basis, self.translation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WORD: RecordLayout = RecordLayout::new("word", 4);

    fn buffer_with_words(header_len: usize, words: &[i32]) -> Vec<u8> {
        let mut data = vec![0u8; header_len];
        for w in words {
            data.extend_from_slice(&w.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_read_table_from_record_start() {
        let mut data = buffer_with_words(8, &[7, 8, 9]);
        data[0..4].copy_from_slice(&3i32.to_le_bytes());
        data[4..8].copy_from_slice(&8i32.to_le_bytes());

        let mut cursor = Cursor::new(&data);
        let table = cursor.read_table_ref("test", "words").unwrap();
        assert_eq!(table.pair_end, 8);

        let words = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap();
        assert_eq!(words, vec![7, 8, 9]);
        assert_eq!(cursor.position(), 8);
    }

    #[test]
    fn test_read_table_from_pair_end() {
        // Record starts at 4, pair sits at 8..16; the stored offset is relative
        // to the record start once the 12-byte correction is applied
        let mut data = buffer_with_words(16, &[42, 43]);
        data[8..12].copy_from_slice(&2i32.to_le_bytes());
        data[12..16].copy_from_slice(&12i32.to_le_bytes());

        let mut cursor = Cursor::new(&data);
        cursor.seek(8).unwrap();
        let table = cursor.read_table_ref("test", "words").unwrap();
        assert_eq!((table.count_at, table.pair_end), (8, 16));
        let words = cursor
            .read_table(&table, OffsetOrigin::PairEnd { back: 12 }, WORD, |c, _| {
                c.read_i32()
            })
            .unwrap();
        assert_eq!(words, vec![42, 43]);
    }

    #[test]
    fn test_read_table_empty_ignores_offset() {
        let data = [0u8; 4];
        let mut cursor = Cursor::new(&data);
        let table = TableRef::new("test", "words", 0, 1000, 0);
        let words: Vec<i32> = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_read_table_negative_count() {
        let data = [0u8; 16];
        let mut cursor = Cursor::new(&data);
        let table = TableRef::new("test", "words", -1, 0, 12);
        let err = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::InvalidCount {
                field: "words",
                count: -1,
                offset: 12,
                ..
            }
        ));
    }

    #[test]
    fn test_read_table_offset_past_end() {
        let data = [0u8; 16];
        let mut cursor = Cursor::new(&data);
        let table = TableRef::new("test", "words", 1, 16, 0);
        let err = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::OffsetOutOfRange {
                structure: "test",
                field: "words",
                offset: 16,
                len: 16
            }
        ));
    }

    #[test]
    fn test_read_table_too_long_for_buffer() {
        let data = [0u8; 16];
        let mut cursor = Cursor::new(&data);
        let table = TableRef::new("test", "words", 4, 4, 0);
        let err = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::TruncatedBuffer {
                structure: Some("word"),
                offset: 4,
                needed: 16,
                ..
            }
        ));
    }

    #[test]
    fn test_read_table_limit() {
        let data = [0u8; 64];
        let limits = crate::ParseLimits {
            max_table_count: 2,
            ..Default::default()
        };
        let mut cursor = Cursor::with_limits(&data, limits);
        let table = TableRef::new("test", "words", 3, 0, 0);
        let err = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| c.read_i32())
            .unwrap_err();
        assert!(matches!(err, StudioError::LimitExceeded { value: 3, limit: 2, .. }));
    }

    #[test]
    fn test_record_error_names_record() {
        let data = [0u8; 16];
        let mut cursor = Cursor::new(&data);
        let table = TableRef::new("test", "words", 2, 8, 0);
        let err = cursor
            .read_table(&table, OffsetOrigin::Start(0), WORD, |c, _| {
                c.skip(4)?;
                c.read_i32()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::TruncatedBuffer {
                structure: Some("word"),
                offset: 16,
                ..
            }
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_matrix_to_affine() {
        let m = Matrix3x4([
            [0.0, -1.0, 0.0, 5.0],
            [1.0, 0.0, 0.0, 6.0],
            [0.0, 0.0, 1.0, 7.0],
        ]);
        let affine = m.to_affine();
        let p = affine.transform_point3(Vec3::X);
        assert!((p - Vec3::new(5.0, 7.0, 7.0)).length() < 1e-6);
        assert_eq!(Matrix3x4::IDENTITY.to_affine(), Affine3A::IDENTITY);
    }

    proptest! {
        #[test]
        fn prop_read_table_restores_position(
            start in 0u64..64,
            count in -4i32..24,
            offset in -32i32..96,
        ) {
            let data = vec![0xABu8; 80];
            let mut cursor = Cursor::new(&data);
            cursor.seek(start).unwrap();
            let table = TableRef::new("test", "words", count, offset, start);
            let _ = cursor.read_table(&table, OffsetOrigin::Start(start), WORD, |c, _| c.read_i32());
            prop_assert_eq!(cursor.position(), start);
        }
    }
}
