use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};

/// A single zikir record, as clients receive it.
///
/// Field order matches the wire format the apps already consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub category: String,
    /// Insertion order is preserved; an entry without tags carries `[]`.
    pub tags: Vec<String>,
    pub arabic: String,
    pub translations: Translations,
    pub target_count: u32,
    pub description: String,
    /// Catalog version the entry first appeared in. Never changes.
    pub created_version: u64,
    /// Catalog version of the entry's latest modification.
    pub updated_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translations {
    pub tr: String,
    pub en: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) id: String,
    pub(crate) category: String,
    pub(crate) arabic: String,
    pub(crate) tr_text: String,
    pub(crate) en_text: String,
    pub(crate) target_count: i64,
    pub(crate) description: String,
    pub(crate) created_version: i64,
    pub(crate) updated_version: i64,
}

impl TryFrom<EntryRow> for CatalogEntry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let created_version =
            u64::try_from(row.created_version).or_raise(|| ErrorKind::InvalidData("created version"))?;
        let updated_version =
            u64::try_from(row.updated_version).or_raise(|| ErrorKind::InvalidData("updated version"))?;
        if updated_version < created_version {
            exn::bail!(ErrorKind::InvalidData("updated version precedes created version"));
        }
        Ok(Self {
            id: row.id,
            category: row.category,
            // Tags live in their own table and are attached by the assembler.
            tags: Vec::new(),
            arabic: row.arabic,
            translations: Translations { tr: row.tr_text, en: row.en_text },
            target_count: u32::try_from(row.target_count).or_raise(|| ErrorKind::InvalidData("target count"))?,
            description: row.description,
            created_version,
            updated_version,
        })
    }
}
