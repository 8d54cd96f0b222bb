//! DOI cache engine
//!
//! [`Cache`] answers lookups from a local [`Store`] while entries are fresh and
//! goes out to the handle API when they are missing or expired. Fetched
//! responses are stored verbatim together with their fetch time, so an entry
//! can be checked for freshness without parsing the resolver's format.
//!
//! Expired entries are never evicted; they stay in the store until the next
//! lookup of the same key overwrites them.

mod dump;
mod fetch;

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::{CacheConfig, HttpConfig};
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::handle::HandleResponse;
use crate::store::{LmdbStore, Store};
use crate::transport::{HttpTransport, Transport};

/// Source of the current time for freshness checks and fetch timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// TTL cache of handle API responses
///
/// The store is opened before the cache is built and stays open until
/// [`Cache::close`] consumes the cache.
pub struct Cache<S: Store = LmdbStore, T: Transport = HttpTransport> {
    store: S,
    transport: T,
    config: CacheConfig,
    clock: Box<dyn Clock>,
}

impl Cache<LmdbStore, HttpTransport> {
    /// Opens an LMDB-backed cache at `path` that fetches over HTTP
    ///
    /// The directory is created if it does not exist. The store's map size
    /// comes from [`CacheConfig::map_size`].
    pub fn open<P: AsRef<Path>>(path: P, config: CacheConfig, http: HttpConfig) -> Result<Self> {
        let store = LmdbStore::open_with_map_size(path, config.map_size)?;
        let transport = HttpTransport::new(http)?;
        Ok(Self::new(store, transport, config))
    }

    /// Directory holding the database
    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

impl<S: Store, T: Transport> Cache<S, T> {
    /// Builds a cache from an already opened store and a transport
    pub fn new(store: S, transport: T, config: CacheConfig) -> Self {
        Self {
            store,
            transport,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the system clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the raw handle API response for `key`
    ///
    /// A fresh stored entry is returned without network access. A missing or
    /// expired entry is fetched once and stored before returning. The key is
    /// used verbatim; no normalization takes place.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let Some(raw) = self.store.get(key.as_bytes())? else {
            tracing::debug!(key, "cache miss");
            return self.fetch(key);
        };

        let entry = CacheEntry::decode(&raw)?;
        if entry.is_expired(self.config.ttl, self.clock.now()) {
            tracing::debug!(key, fetched_at = %entry.fetched_at, "entry expired");
            return self.fetch(key);
        }

        tracing::debug!(key, "cache hit");
        Ok(entry.payload)
    }

    /// Returns the redirect URL a DOI resolves to
    ///
    /// [`Error::NoRedirect`](crate::Error::NoRedirect) reports a well-formed
    /// response without a usable URL; callers usually want to treat it
    /// differently from decode, protocol and transport failures.
    pub fn resolve(&self, key: &str) -> Result<String> {
        let payload = self.get(key)?;
        HandleResponse::decode(&payload)?.redirect_url()
    }

    /// Closes the underlying store
    pub fn close(self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, NoRedirect, TransportError};
    use crate::store::MemoryStore;
    use crate::transport::Response;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use std::io::{self, Read};
    use std::rc::Rc;
    use std::time::Duration;

    const DOI: &str = "10.1000/xyz";

    fn payload(url: &str) -> String {
        format!(
            r#"{{"responseCode":1,"handle":"{DOI}","values":[{{"index":1,"type":"URL","data":{{"format":"string","value":"{url}"}},"ttl":86400,"timestamp":"2019-04-15T16:31:53Z"}}]}}"#
        )
    }

    /// What the fake resolver answers with
    #[derive(Clone)]
    enum Reply {
        Status(u16, String),
        BrokenBody,
        Unreachable,
    }

    /// Body reader that always fails, to detect reads of bodies that must be skipped
    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
        }
    }

    struct FakeTransport {
        reply: RefCell<Reply>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply: RefCell::new(reply),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn ok(body: impl Into<String>) -> Self {
            Self::new(Reply::Status(200, body.into()))
        }

        fn set_reply(&self, reply: Reply) {
            *self.reply.borrow_mut() = reply;
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> std::result::Result<Response, TransportError> {
            self.requests.borrow_mut().push(url.to_string());
            match self.reply.borrow().clone() {
                Reply::Status(200, body) => {
                    Ok(Response::new(200, io::Cursor::new(body.into_bytes())))
                }
                Reply::Status(status, _) => Ok(Response::new(status, FailingReader)),
                Reply::BrokenBody => Ok(Response::new(200, FailingReader)),
                Reply::Unreachable => Err(TransportError::Body(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
            }
        }
    }

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<DateTime<Utc>>>);

    impl ManualClock {
        fn start() -> Self {
            Self(Rc::new(Cell::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())))
        }

        fn advance(&self, by: Duration) {
            self.0.set(self.0.get() + chrono::Duration::from_std(by).unwrap());
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }

    fn create_test_cache(
        transport: FakeTransport,
        ttl: Duration,
    ) -> (Cache<MemoryStore, FakeTransport>, ManualClock) {
        let clock = ManualClock::start();
        let config = CacheConfig::default()
            .with_endpoint("http://resolver.test/api/handles/")
            .with_ttl(ttl);
        let cache = Cache::new(MemoryStore::new(), transport, config).with_clock(clock.clone());
        (cache, clock)
    }

    fn stored_entry(cache: &Cache<MemoryStore, FakeTransport>, key: &str) -> Option<CacheEntry> {
        cache
            .store()
            .get(key.as_bytes())
            .unwrap()
            .map(|raw| CacheEntry::decode(&raw).unwrap())
    }

    #[test]
    fn test_resolve_on_empty_store_fetches_and_stores() {
        let (cache, clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(3600),
        );

        assert_eq!(cache.resolve(DOI).unwrap(), "https://example.org/xyz");

        assert_eq!(cache.transport().calls(), 1);
        assert_eq!(
            cache.transport().requests.borrow()[0],
            "http://resolver.test/api/handles/10.1000/xyz"
        );
        assert_eq!(cache.store().len(), 1);
        let entry = stored_entry(&cache, DOI).unwrap();
        assert_eq!(entry.payload, payload("https://example.org/xyz").into_bytes());
        assert_eq!(entry.fetched_at, clock.now());
    }

    #[test]
    fn test_second_resolve_within_ttl_does_not_fetch() {
        let (cache, clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(3600),
        );

        let first = cache.resolve(DOI).unwrap();
        cache.transport().set_reply(Reply::Unreachable);
        clock.advance(Duration::from_secs(3599));
        let second = cache.resolve(DOI).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.transport().calls(), 1);
    }

    #[test]
    fn test_fresh_get_returns_stored_bytes() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::new(Reply::Unreachable),
            Duration::from_secs(60),
        );
        let stored = b"{\"values\": []}  \n".to_vec();
        let entry = CacheEntry::new(ManualClock::start().now(), stored.clone());
        cache.store().put(DOI.as_bytes(), &entry.encode().unwrap()).unwrap();

        assert_eq!(cache.get(DOI).unwrap(), stored);
        assert_eq!(cache.transport().calls(), 0);
    }

    #[test]
    fn test_expired_entry_is_refetched_once() {
        let (cache, clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/old")),
            Duration::from_secs(3600),
        );
        cache.resolve(DOI).unwrap();

        clock.advance(Duration::from_secs(3600));
        cache.transport().set_reply(Reply::Status(200, payload("https://example.org/new")));

        assert_eq!(cache.resolve(DOI).unwrap(), "https://example.org/new");
        assert_eq!(cache.transport().calls(), 2);

        let entry = stored_entry(&cache, DOI).unwrap();
        assert_eq!(entry.fetched_at, clock.now());
        assert_eq!(entry.payload, payload("https://example.org/new").into_bytes());

        // Fresh again after the refetch
        assert_eq!(cache.resolve(DOI).unwrap(), "https://example.org/new");
        assert_eq!(cache.transport().calls(), 2);
    }

    #[test]
    fn test_zero_ttl_always_refetches() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::ZERO,
        );

        cache.get(DOI).unwrap();
        cache.get(DOI).unwrap();
        cache.get(DOI).unwrap();

        assert_eq!(cache.transport().calls(), 3);
        assert_eq!(cache.store().len(), 1);
    }

    #[test]
    fn test_keys_are_not_normalized() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(3600),
        );

        cache.get("10.1000/XYZ").unwrap();
        cache.get("10.1000/xyz").unwrap();

        assert_eq!(cache.transport().calls(), 2);
        assert_eq!(cache.store().len(), 2);
    }

    #[test]
    fn test_not_found_is_protocol_error_and_not_stored() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::new(Reply::Status(404, String::new())),
            Duration::from_secs(3600),
        );

        let err = cache.get(DOI).unwrap_err();

        match err {
            Error::Protocol { status, url } => {
                assert_eq!(status, 404);
                assert_eq!(url, "http://resolver.test/api/handles/10.1000/xyz");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_failed_refetch_keeps_expired_entry() {
        let (cache, clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(60),
        );
        cache.get(DOI).unwrap();
        let before = cache.store().get(DOI.as_bytes()).unwrap();

        clock.advance(Duration::from_secs(120));
        cache.transport().set_reply(Reply::Status(503, String::new()));

        assert!(matches!(cache.get(DOI), Err(Error::Protocol { status: 503, .. })));
        assert_eq!(cache.store().get(DOI.as_bytes()).unwrap(), before);
    }

    #[test]
    fn test_transport_errors_propagate() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::new(Reply::Unreachable),
            Duration::from_secs(60),
        );
        assert!(matches!(cache.resolve(DOI), Err(Error::Transport(_))));
        assert!(cache.store().is_empty());

        cache.transport().set_reply(Reply::BrokenBody);
        assert!(matches!(
            cache.get(DOI),
            Err(Error::Transport(TransportError::Body(_)))
        ));
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_empty_values_is_no_redirect_and_store_untouched() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::new(Reply::Unreachable),
            Duration::from_secs(60),
        );
        let entry = CacheEntry::new(
            ManualClock::start().now(),
            br#"{"handle":"10.1000/xyz","responseCode":1,"values":[]}"#.to_vec(),
        );
        let raw = entry.encode().unwrap();
        cache.store().put(DOI.as_bytes(), &raw).unwrap();

        let err = cache.resolve(DOI).unwrap_err();

        assert!(matches!(err, Error::NoRedirect(NoRedirect::MissingUrlRecord)));
        assert_eq!(cache.store().get(DOI.as_bytes()).unwrap(), Some(raw));
        assert_eq!(cache.transport().calls(), 0);
    }

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(r#"{"values":[{"type":"URL","data":{"format":"string"}}]}"#),
            Duration::from_secs(60),
        );
        assert!(matches!(
            cache.resolve("10.1/missing-value"),
            Err(Error::NoRedirect(NoRedirect::MissingValueKey))
        ));

        cache.transport().set_reply(Reply::Status(200, "<html>oops</html>".to_string()));
        let err = cache.resolve("10.1/garbage").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        // Undecodable payloads are still cached as received
        assert!(cache.store().get(b"10.1/garbage").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_stored_entry_is_decode_error_without_fetch() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(60),
        );
        cache.store().put(DOI.as_bytes(), b"\x00garbage").unwrap();

        assert!(matches!(cache.get(DOI), Err(Error::Decode(_))));
        assert_eq!(cache.transport().calls(), 0);
    }

    #[test]
    fn test_dump_keys_in_store_order() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/xyz")),
            Duration::from_secs(60),
        );
        for key in ["10.5555/b", "10.1000/a", "10.5555/a"] {
            cache.get(key).unwrap();
        }

        let mut out = Vec::new();
        cache.dump_keys(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "10.1000/a\n10.5555/a\n10.5555/b\n");
    }

    #[test]
    fn test_dump_key_values_renders_markers() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/a")),
            Duration::from_secs(60),
        );
        cache.get("10.1000/a").unwrap();
        cache
            .transport()
            .set_reply(Reply::Status(200, r#"{"values":[]}"#.to_string()));
        cache.get("10.1000/b").unwrap();
        cache
            .transport()
            .set_reply(Reply::Status(200, r#"{"values":[{"type":"URL","data":{}}]}"#.to_string()));
        cache.get("10.1000/c").unwrap();

        let mut out = Vec::new();
        cache.dump_key_values(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "10.1000/a\thttps://example.org/a\n10.1000/b\tErrMissingURLValue\n10.1000/c\tErrMissingValueKey\n"
        );
    }

    #[test]
    fn test_dump_key_values_aborts_on_corrupt_payload() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(payload("https://example.org/a")),
            Duration::from_secs(60),
        );
        cache.get("10.1000/a").unwrap();
        cache
            .transport()
            .set_reply(Reply::Status(200, "not json".to_string()));
        cache.get("10.1000/b").unwrap();

        let mut out = Vec::new();
        let err = cache.dump_key_values(&mut out).unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(String::from_utf8(out).unwrap(), "10.1000/a\thttps://example.org/a\n");
    }

    #[test]
    fn test_dump_key_values_aborts_on_unexpected_url_data() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::ok(r#"{"values":[{"type":"URL","data":["x"]}]}"#),
            Duration::from_secs(60),
        );
        cache.get(DOI).unwrap();

        let err = cache.dump_key_values(io::sink()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedUrlData { found: "array" }));
    }

    #[test]
    fn test_close_consumes_cache() {
        let (cache, _clock) = create_test_cache(
            FakeTransport::new(Reply::Unreachable),
            Duration::from_secs(60),
        );
        cache.close().unwrap();
    }
}
