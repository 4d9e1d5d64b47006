use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;
use twin_hash::Digest;

/// A digest remembered for one file key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub digest: Digest,
    pub written_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) file_key: String,
    pub(crate) digest: String,
    pub(crate) written_at: i64,
}
impl From<&CacheEntry> for EntryRow {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            file_key: entry.key.clone(),
            digest: entry.digest.to_string(),
            written_at: entry.written_at.unix_timestamp(),
        }
    }
}
impl TryFrom<EntryRow> for CacheEntry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.file_key,
            digest: Digest::parse(&row.digest).or_raise(|| ErrorKind::InvalidData("digest"))?,
            written_at: UtcDateTime::from_unix_timestamp(row.written_at)
                .or_raise(|| ErrorKind::InvalidData("written at"))?,
        })
    }
}
