use crate::common::{OffsetOrigin, RecordLayout, TableRef};
use crate::cursor::Cursor;
use crate::error::{Result, StudioError};
use crate::header::{SKIN_FAMILY_COUNT_AT, SKIN_REFERENCE_COUNT_AT};

pub const TEXTURE: RecordLayout = RecordLayout::new("texture", 64);

const TEXTURE_RESERVED: usize = 40;

/// A material reference
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct Texture {
    /// Material path relative to one of the search directories
    pub name: String,
    pub flags: i32,
    pub used: i32,
}

impl Texture {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.position();
        let name_index = cursor.read_i32()?;
        let flags = cursor.read_i32()?;
        let used = cursor.read_i32()?;
        // unused, material and client material are runtime pointers
        cursor.skip(12)?;
        cursor.skip(TEXTURE_RESERVED)?;
        let name = cursor.read_string_rel(start, name_index, "texture", "name")?;
        Ok(Self { name, flags, used })
    }
}

/// Read the material search directories; each entry is a file offset of a string
pub fn read_texture_dirs(cursor: &mut Cursor<'_>, table: &TableRef) -> Result<Vec<String>> {
    cursor.read_table(
        table,
        OffsetOrigin::Start(0),
        RecordLayout::new("texture dir", 4),
        |c, _| {
            let offset = c.read_i32()?;
            c.read_string_rel(0, offset, "texture dir", "name")
        },
    )
}

/// Texture index per skin family and material slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct SkinTable {
    reference_count: usize,
    entries: Vec<u16>,
}

impl SkinTable {
    /// Read a `families x references` table of texture indices at a file offset
    pub fn parse(
        cursor: &mut Cursor<'_>,
        family_count: i32,
        reference_count: i32,
        offset: i32,
        texture_count: usize,
    ) -> Result<Self> {
        let families = cursor.checked_count(
            "mdl header",
            "skin_family_count",
            family_count,
            SKIN_FAMILY_COUNT_AT,
        )?;
        let references = cursor.checked_count(
            "mdl header",
            "skin_reference_count",
            reference_count,
            SKIN_REFERENCE_COUNT_AT,
        )?;
        let cells = families
            .checked_mul(references)
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(i32::MAX);

        let table = TableRef::new(
            "mdl header",
            "skin_table",
            cells,
            offset,
            SKIN_FAMILY_COUNT_AT,
        );
        let entries = cursor.read_table(
            &table,
            OffsetOrigin::Start(0),
            RecordLayout::new("skin entry", 2),
            |c, _| {
                let index = c.read_i16()?;
                if index < 0 || index as usize >= texture_count {
                    return Err(StudioError::InvalidReference {
                        structure: "skin table",
                        field: "texture",
                        value: index as i64,
                        max: texture_count as i64 - 1,
                    });
                }
                Ok(index as u16)
            },
        )?;

        Ok(Self {
            reference_count: references,
            entries,
        })
    }

    pub fn family_count(&self) -> usize {
        if self.reference_count == 0 {
            0
        } else {
            self.entries.len() / self.reference_count
        }
    }

    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    /// Texture indices of one skin family, indexed by material slot
    pub fn family(&self, family: usize) -> Option<&[u16]> {
        let start = family.checked_mul(self.reference_count)?;
        let end = start.checked_add(self.reference_count)?;
        self.entries.get(start..end)
    }

    /// Texture index for a skin family and material slot
    pub fn texture(&self, family: usize, slot: usize) -> Option<usize> {
        if slot >= self.reference_count {
            return None;
        }
        self.family(family)?.get(slot).map(|&t| t as usize)
    }
}
