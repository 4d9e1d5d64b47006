use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the catalog knows about a digest it has seen before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// The store's own dedup key; the same digest that was looked up.
    #[serde(rename = "md5")]
    pub digest: String,
    /// Canonical location of the stored object.
    pub url: String,
    /// Alternate (raw) source for the same object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Anything else the store reports (name, size, scene, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl CatalogRecord {
    pub fn new(digest: impl Into<String>, url: impl Into<String>) -> Self {
        Self { digest: digest.into(), url: url.into(), src: None, extra: Map::new() }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }
}

/// Answer to a digest lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(CatalogRecord),
    /// The catalog answered, but doesn't hold this content. Status and
    /// message are kept for diagnostics.
    NotFound { status: String, message: Option<String> },
}
impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<CatalogRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound { .. } => None,
        }
    }
}

/// The JSON body every lookup response is wrapped in.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) data: Option<Value>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

const STATUS_OK: &str = "ok";

impl TryFrom<Envelope> for Lookup {
    type Error = Error;
    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let Envelope { status, data, message } = envelope;
        let not_found = || Self::NotFound { status: status.clone(), message: message.clone() };
        if status != STATUS_OK {
            return Ok(not_found());
        }
        // The store answers "ok" with a null, empty-string or empty-object
        // payload when it has nothing for the digest.
        let data = match data {
            None | Some(Value::Null) => return Ok(not_found()),
            Some(Value::String(s)) if s.is_empty() => return Ok(not_found()),
            Some(Value::Object(o)) if o.is_empty() => return Ok(not_found()),
            Some(data) => data,
        };
        let record: CatalogRecord = serde_json::from_value(data).or_raise(|| ErrorKind::Decode)?;
        if record.digest.is_empty() {
            return Ok(not_found());
        }
        Ok(Self::Found(record))
    }
}
