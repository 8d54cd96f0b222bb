//! Read-only listings of the cache contents

use std::io::Write;

use super::Cache;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::handle::HandleResponse;
use crate::store::Store;
use crate::transport::Transport;

impl<S: Store, T: Transport> Cache<S, T> {
    /// Writes every cached key to `sink`, one per line, in store order
    pub fn dump_keys<W: Write>(&self, mut sink: W) -> Result<()> {
        self.store.for_each(&mut |key, _| {
            sink.write_all(key)?;
            sink.write_all(b"\n")?;
            Ok(())
        })?;
        sink.flush()?;
        Ok(())
    }

    /// Writes `key\tredirect` for every cached key to `sink`
    ///
    /// Entries without a usable redirect are listed with the marker of their
    /// [`NoRedirect`](crate::NoRedirect) kind in place of the URL. Any other
    /// decode failure aborts the dump.
    pub fn dump_key_values<W: Write>(&self, mut sink: W) -> Result<()> {
        self.store.for_each(&mut |key, value| {
            let entry = CacheEntry::decode(value)?;
            let redirect = match HandleResponse::decode(&entry.payload)?.redirect_url() {
                Ok(url) => url,
                Err(Error::NoRedirect(kind)) => kind.marker().to_string(),
                Err(err) => return Err(err),
            };
            sink.write_all(key)?;
            sink.write_all(b"\t")?;
            sink.write_all(redirect.as_bytes())?;
            sink.write_all(b"\n")?;
            Ok(())
        })?;
        sink.flush()?;
        Ok(())
    }
}
