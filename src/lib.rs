//! doicache - DOI to redirect URL resolution with a local TTL cache
//!
//! Responses of the doi.org handle API are stored verbatim in an ordered
//! key-value store together with their fetch time. Lookups within the TTL are
//! answered locally; missing or expired entries are fetched once and stored.
//!
//! ```no_run
//! use doicache::{Cache, CacheConfig, Error, HttpConfig};
//!
//! let cache = Cache::open("/tmp/doicache", CacheConfig::default(), HttpConfig::default())?;
//! match cache.resolve("10.1000/182") {
//!     Ok(url) => println!("{url}"),
//!     Err(Error::NoRedirect(kind)) => eprintln!("no redirect: {kind}"),
//!     Err(err) => return Err(err),
//! }
//! cache.close()?;
//! # Ok::<(), doicache::Error>(())
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod handle;
pub mod store;
pub mod transport;

pub use cache::{Cache, Clock, SystemClock};
pub use config::{CacheConfig, HttpConfig};
pub use entry::CacheEntry;
pub use error::{Error, NoRedirect, Result, StoreError, TransportError};
pub use handle::{HandleResponse, HandleValue, ValueKind};
pub use store::{LmdbStore, MemoryStore, Store};
pub use transport::{HttpTransport, Response, Transport};
