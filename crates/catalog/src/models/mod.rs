mod entry;

pub use self::entry::{CatalogEntry, Translations};
pub(crate) use self::entry::EntryRow;
