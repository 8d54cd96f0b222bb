//! LMDB-backed [`Store`].
//!
//! Uses heed with a single unnamed database of raw byte keys and values. Each
//! read runs in its own read transaction and each write commits its own write
//! transaction, so point operations are atomic with respect to each other.
//!
//! LMDB has two fixed limits: keys must be 1 to [`Env::max_key_size`] bytes
//! (511 by default), and the data file cannot grow past the map size chosen
//! at open. Both surface as dedicated [`StoreError`] variants.

use std::fs;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, MdbError};

use super::Store;
use crate::config::DEFAULT_MAP_SIZE;
use crate::error::{Result, StoreError};

/// Durable store kept in an LMDB environment directory
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbStore {
    /// Opens the store at `path`, creating the directory if it is missing
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, StoreError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    /// Opens the store with an explicit map size in bytes
    pub fn open_with_map_size<P: AsRef<Path>>(
        path: P,
        map_size: usize,
    ) -> std::result::Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        // SAFETY: the environment is owned by this store for its whole lifetime
        // and the same directory is not opened twice by this process.
        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(1).open(&path)? };

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None)?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened lmdb store");
        Ok(Self { env, db, path })
    }

    /// Directory holding the LMDB files
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current upper bound of the data file in bytes
    pub fn map_size(&self) -> usize {
        self.env.info().map_size
    }

    fn check_key(&self, key: &[u8]) -> std::result::Result<(), StoreError> {
        let max = self.env.max_key_size();
        match key.len() {
            0 => Err(StoreError::EmptyKey),
            len if len > max => Err(StoreError::KeyTooLarge { len, max }),
            _ => Ok(()),
        }
    }

    fn write_error(&self, err: heed::Error) -> StoreError {
        match err {
            heed::Error::Mdb(MdbError::MapFull) => StoreError::MapFull {
                map_size: self.map_size(),
            },
            other => other.into(),
        }
    }
}

impl Store for LmdbStore {
    fn get(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        self.check_key(key)?;
        let rtxn = self.env.read_txn()?;
        let value = self.db.get(&rtxn, key)?.map(<[u8]>::to_vec);
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> std::result::Result<(), StoreError> {
        self.check_key(key)?;
        let mut wtxn = self.env.write_txn()?;
        self.db
            .put(&mut wtxn, key, value)
            .map_err(|err| self.write_error(err))?;
        wtxn.commit().map_err(|err| self.write_error(err))
    }

    fn for_each(&self, visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        let rtxn = self.env.read_txn().map_err(StoreError::from)?;
        let iter = self.db.iter(&rtxn).map_err(StoreError::from)?;
        for entry in iter {
            let (key, value) = entry.map_err(StoreError::from)?;
            visit(key, value)?;
        }
        Ok(())
    }

    fn close(self) -> std::result::Result<(), StoreError> {
        let LmdbStore { env, path, .. } = self;
        env.prepare_for_closing().wait();
        tracing::debug!(path = %path.display(), "closed lmdb store");
        Ok(())
    }
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore").field("path", &self.path).finish()
    }
}
