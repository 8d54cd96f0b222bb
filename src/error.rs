//! Error types for doicache
//!
//! Every failure the cache engine can produce surfaces as a variant of
//! [`Error`], so callers can tell store, transport, protocol, decode and
//! "no redirect" outcomes apart and decide per kind whether to continue.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Cache`](crate::Cache) and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be opened, read or written
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The fetch request could not be completed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The resolver answered with a status other than 200
    #[error("HTTP {status} {url}")]
    Protocol {
        /// HTTP status code returned by the resolver
        status: u16,
        /// The exact URL that was requested
        url: String,
    },

    /// Stored entry or response payload is not valid JSON of the expected shape
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A cache entry could not be serialized
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// The first URL record carries data that is not an object
    #[error("unexpected payload for URL type: {found}")]
    UnexpectedUrlData {
        /// JSON shape found instead of an object
        found: &'static str,
    },

    /// The payload is well-formed but holds no usable redirect
    #[error(transparent)]
    NoRedirect(#[from] NoRedirect),

    /// Writing dump output failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the recoverable "no redirect value" outcome
    pub fn is_no_redirect(&self) -> bool {
        matches!(self, Error::NoRedirect(_))
    }
}

/// Why a well-formed handle response yields no redirect URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoRedirect {
    /// No value record of type `URL` at all
    #[error("missing URL redirect entry")]
    MissingUrlRecord,

    /// A `URL` record whose data lacks the `value` key
    #[error("missing value key")]
    MissingValueKey,
}

impl NoRedirect {
    /// Placeholder written by key/value dumps instead of a redirect
    pub fn marker(self) -> &'static str {
        match self {
            NoRedirect::MissingUrlRecord => "ErrMissingURLValue",
            NoRedirect::MissingValueKey => "ErrMissingValueKey",
        }
    }
}

/// Failures of the underlying key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// LMDB reported an error
    #[error("lmdb: {0}")]
    Lmdb(#[from] heed::Error),

    /// The key is longer than the store accepts
    #[error("key of {len} bytes exceeds the maximum of {max}")]
    KeyTooLarge { len: usize, max: usize },

    /// The store does not accept zero-length keys
    #[error("empty key")]
    EmptyKey,

    /// The LMDB map is full; reopen with a larger map size
    #[error("store is full (map size {map_size} bytes)")]
    MapFull { map_size: usize },

    /// Filesystem error, e.g. while creating the store directory
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// An in-memory store lock was poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures of the HTTP transport before a complete response was received
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body could not be read
    #[error("reading body failed: {0}")]
    Body(#[from] std::io::Error),
}
