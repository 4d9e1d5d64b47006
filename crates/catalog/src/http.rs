//! HTTP catalog client.
//!
//! Lookups are a single `GET <gateway><lookup path>?<params>&md5=<digest>`
//! answered with a JSON envelope:
//!
//! ```json
//! {"status": "ok", "data": {"md5": "...", "url": "...", "src": "..."}}
//! {"status": "fail", "message": "file not found"}
//! ```

use crate::error::{ErrorKind, Result};
use crate::record::Envelope;
use crate::{Lookup, RemoteCatalog, validate_query};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_LOOKUP_PATH: &str = "/file1/upload";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How to reach the lookup endpoint below the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Appended to the gateway address as-is (the gateway's own path is kept).
    pub lookup_path: String,
    /// Extra query parameters sent before `md5`.
    pub params: Vec<(String, String)>,
    /// Upper bound on a whole lookup: connect, request and body.
    pub timeout: Duration,
}
impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            lookup_path: DEFAULT_LOOKUP_PATH.to_string(),
            params: vec![("output".to_string(), "json2".to_string())],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`RemoteCatalog`] talking to the store over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    endpoint: Url,
    params: Vec<(String, String)>,
}

impl HttpCatalog {
    /// # Errors
    ///
    /// Returns [`InvalidGateway`](ErrorKind::InvalidGateway) unless `gateway`
    /// is an absolute `http` or `https` URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use twin_catalog::{CatalogOptions, HttpCatalog};
    ///
    /// let catalog = HttpCatalog::new("http://files.example.com/group1", CatalogOptions::default()).unwrap();
    /// assert_eq!(catalog.endpoint().as_str(), "http://files.example.com/group1/file1/upload");
    /// assert!(HttpCatalog::new("files.example.com", CatalogOptions::default()).is_err());
    /// ```
    pub fn new(gateway: &str, options: CatalogOptions) -> Result<Self> {
        let endpoint = Self::endpoint_for(gateway, &options.lookup_path)?;
        let http = reqwest::Client::builder().timeout(options.timeout).build().or_raise(|| ErrorKind::Client)?;
        Ok(Self { http, endpoint, params: options.params })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn endpoint_for(gateway: &str, lookup_path: &str) -> Result<Url> {
        // Plain concatenation: `Url::join` with an absolute path would throw
        // away any path prefix the gateway is mounted under.
        let raw = format!("{}/{}", gateway.trim_end_matches('/'), lookup_path.trim_start_matches('/'));
        let url = Url::parse(&raw).or_raise(|| ErrorKind::InvalidGateway(gateway.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::InvalidGateway(gateway.to_string()));
        }
        Ok(url)
    }

    fn lookup_url(&self, digest: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
            query.append_pair("md5", digest);
        }
        url
    }

    fn failure_kind(err: &reqwest::Error) -> ErrorKind {
        if err.is_timeout() { ErrorKind::Timeout } else { ErrorKind::Network }
    }
}

#[async_trait]
impl RemoteCatalog for HttpCatalog {
    async fn lookup(&self, digest: &str) -> Result<Lookup> {
        validate_query(digest)?;
        let url = self.lookup_url(digest);
        tracing::debug!(%url, "looking up digest");
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = Self::failure_kind(&err);
                return Err(err).or_raise(|| kind);
            },
        };
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, digest, "lookup rejected by catalog");
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                let kind = Self::failure_kind(&err);
                return Err(err).or_raise(|| kind);
            },
        };
        let envelope: Envelope = serde_json::from_slice(&body).or_raise(|| ErrorKind::Decode)?;
        let lookup = Lookup::try_from(envelope)?;
        match &lookup {
            Lookup::Found(record) => tracing::debug!(digest, url = %record.url, "catalog has digest"),
            Lookup::NotFound { status, message } => {
                tracing::debug!(digest, %status, reason = message.as_deref(), "catalog does not have digest")
            },
        }
        Ok(lookup)
    }
}
