//! Fetching from the handle API
//!
//! A fetch requests `<endpoint>/<key>`, and on HTTP 200 stores the body as a
//! fresh [`CacheEntry`] under the original key. Other statuses become
//! [`Error::Protocol`] without reading the body or touching the store.

use std::io::Read;

use super::Cache;
use crate::entry::CacheEntry;
use crate::error::{Error, Result, TransportError};
use crate::store::Store;
use crate::transport::Transport;

impl<S: Store, T: Transport> Cache<S, T> {
    /// Fetches `key` from the resolver and stores the response
    ///
    /// Returns the raw response body, not the encoded entry.
    pub(super) fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.config.request_url(key);
        tracing::debug!(%url, "fetching");

        let mut response = self.transport.get(&url)?;
        if response.status != 200 {
            return Err(Error::Protocol {
                status: response.status,
                url,
            });
        }

        let mut body = Vec::new();
        response
            .body
            .read_to_end(&mut body)
            .map_err(TransportError::Body)?;

        let entry = CacheEntry::new(self.clock.now(), body);
        self.store.put(key.as_bytes(), &entry.encode()?)?;
        tracing::debug!(key, bytes = entry.payload.len(), "stored entry");

        Ok(entry.payload)
    }
}
