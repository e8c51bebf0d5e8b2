//! Store engine
//!
//! The whole map lives in memory behind one `RwLock`; the backing file is a
//! durable copy kept in step with every mutation. Three write paths keep that
//! copy current:
//!
//! - full rewrite: encode everything to a temp file and rename it over the
//!   old one, used for overwrites, the first key, and compaction
//! - append: a brand new key is encoded alone and appended
//! - tombstone: every line of a deleted key's entries is overwritten with
//!   `\n` in place, leaving file length and every other offset unchanged
//!
//! Tombstones accumulate until `blanks * compaction_ratio` exceeds the entry
//! count, at which point the next delete compacts with a full rewrite.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::codec::{encode_entry, encode_key, Decoder, Encoder, Key};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::expiry::Scheduler;
use crate::stats::Stats;

type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

/// Handle to an open store. Clones share the same state.
pub struct Store<K, V> {
    inner: Arc<RwLock<State<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct State<K, V> {
    path: PathBuf,
    options: Options,
    data: Map<K, V>,
    /// Generation of the pending expiration, for keys that have one
    meta: Map<K, u64>,
    /// File mtime observed after our last read or write
    synced: Option<SystemTime>,
    generation: u64,
    /// Tombstones written since the last full rewrite
    blanks: u64,
    stats: Arc<Stats>,
    expiry: Option<Scheduler<K>>,
}

impl<K, V> Store<K, V>
where
    K: Key + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open the store at `path` with default options, creating the file if
    /// it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Options::default())
    }

    /// Open the store at `path`.
    ///
    /// # Errors
    /// * `Error::Io` if the file cannot be read or created
    /// * `Error::Format` if the existing file is not valid store text
    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let state = State {
            path: path.as_ref().to_path_buf(),
            options,
            data: Map::default(),
            meta: Map::default(),
            synced: None,
            generation: 0,
            blanks: 0,
            stats: Arc::new(Stats::new()),
            expiry: None,
        };
        let store = Store {
            inner: Arc::new(RwLock::new(state)),
        };
        store.inner.write().load()?;
        Ok(store)
    }

    /// Set the time-to-live for subsequent `set` calls. Zero disables
    /// expiration; timers already armed are unaffected.
    pub fn with_ttl(self, ttl: Duration) -> Self {
        self.inner.write().options.ttl = ttl;
        self
    }

    /// Current time-to-live.
    pub fn ttl(&self) -> Duration {
        self.inner.read().options.ttl
    }

    /// Count I/O into `stats` from now on.
    pub fn with_stats(self, stats: Arc<Stats>) -> Self {
        self.inner.write().stats = stats;
        self
    }

    /// I/O counters of this store.
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.inner.read().stats)
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.inner.read().path.clone()
    }

    /// Look up `key`, reloading first if the file changed on disk.
    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        {
            let state = self.inner.read();
            if state.is_fresh() {
                return Ok(state.data.get(key).cloned());
            }
        }

        let mut state = self.inner.write();
        state.load()?;
        Ok(state.data.get(key).cloned())
    }

    /// Like [`Store::try_get`], with absence reported as `Error::NotFound`.
    pub fn get(&self, key: &K) -> Result<V> {
        self.try_get(key)?.ok_or(Error::NotFound)
    }

    /// Insert or replace `key`, persisting before returning.
    ///
    /// With a TTL configured, the key is deleted once the TTL elapses unless
    /// it is set or deleted again in the meantime.
    ///
    /// # Errors
    /// * `Error::Value` if `value` has no representation in the file; the
    ///   store is left untouched
    /// * `Error::Io` if persisting fails; memory already holds the new value
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let entry = encode_entry(&key, &value)?;
        let mut state = self.inner.write();
        let ttl = state.options.ttl;
        if !ttl.is_zero() && state.expiry.is_none() {
            state.expiry = Some(self.start_expiry()?);
        }

        let overwrite = state.data.insert(key.clone(), value).is_some();
        if ttl.is_zero() {
            state.meta.remove(&key);
        } else {
            state.generation += 1;
            let generation = state.generation;
            state.meta.insert(key.clone(), generation);
            if let Some(expiry) = &state.expiry {
                expiry.schedule(key, generation, ttl);
            }
        }

        if overwrite || state.data.len() == 1 {
            state.save()
        } else {
            state.append(entry)
        }
    }

    /// Remove `key`. Removing an absent key does nothing.
    pub fn del(&self, key: &K) -> Result<()> {
        let mut state = self.inner.write();
        state.meta.remove(key);
        if state.data.remove(key).is_some() {
            state.clean(key)?;
        }
        Ok(())
    }

    /// Reload from disk if the file changed since we last saw it.
    pub fn load(&self) -> Result<()> {
        self.inner.write().load()
    }

    /// Rewrite the whole file from memory, dropping all tombstones.
    pub fn save(&self) -> Result<()> {
        self.inner.write().save()
    }

    /// Snapshot of all keys, sorted.
    pub fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = self.inner.read().data.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Scheduler whose handler reaches back into this store without keeping
    /// it alive.
    fn start_expiry(&self) -> Result<Scheduler<K>> {
        let weak = Arc::downgrade(&self.inner);
        let scheduler = Scheduler::start(move |key: K, generation| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.write();
            if let Err(err) = state.expire(&key, generation) {
                warn!(path = %state.path.display(), generation, error = %err, "expiration failed");
            }
        })?;
        debug!("expiration scheduler started");
        Ok(scheduler)
    }
}

impl<K: Key, V: Serialize + DeserializeOwned> State<K, V> {
    /// The file exists and has not been modified since we last synced.
    fn is_fresh(&self) -> bool {
        match (self.synced, modified(&self.path)) {
            (Some(synced), Some(mtime)) => mtime <= synced,
            _ => false,
        }
    }

    fn load(&mut self) -> Result<()> {
        if self.is_fresh() {
            return Ok(());
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "backing file missing, writing from memory");
                return self.save();
            }
            Err(err) => return Err(err.into()),
        };
        let mtime = file.metadata()?.modified()?;

        let mut decoder = Decoder::new(BufReader::new(file));
        let data: Map<K, V> = decoder.decode()?;
        self.stats.record_read();

        self.meta.retain(|key, _| data.contains_key(key));
        self.data = data;
        self.synced = Some(mtime);
        debug!(
            path = %self.path.display(),
            entries = self.data.len(),
            blank_lines = decoder.blank_lines(),
            "reloaded store"
        );
        Ok(())
    }

    /// Full rewrite through a temp file in the same directory.
    fn save(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;

        let mut encoder = Encoder::new(BufWriter::new(tmp.as_file_mut()));
        encoder.encode(&self.data)?;
        encoder.into_inner()?;

        copy_permissions(tmp.as_file(), &self.path)?;
        if self.options.sync {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&self.path).map_err(|err| err.error)?;

        self.blanks = 0;
        self.synced = modified(&self.path);
        self.stats.record_write();
        debug!(path = %self.path.display(), entries = self.data.len(), "rewrote store");
        Ok(())
    }

    /// Appends the encoded entry of a key that is new to the file.
    fn append(&mut self, mut entry: String) -> Result<()> {
        let fresh = self.is_fresh();
        let mut file = match OpenOptions::new().read(true).append(true).open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return self.save(),
            Err(err) => return Err(err.into()),
        };

        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                entry.insert(0, '\n');
            }
        }
        file.write_all(entry.as_bytes())?;
        if self.options.sync {
            file.sync_data()?;
        }

        if fresh {
            self.synced = modified(&self.path);
        }
        self.stats.record_write();
        trace!(path = %self.path.display(), bytes = entry.len(), "appended entry");
        Ok(())
    }

    /// Erases a removed key from the file, compacting once enough dead
    /// space has built up.
    fn clean(&mut self, key: &K) -> Result<()> {
        let entries = self.data.len() as u64;
        if self.blanks.saturating_mul(self.options.compaction_ratio) > entries {
            debug!(path = %self.path.display(), blanks = self.blanks, entries, "compacting");
            return self.save();
        }

        let fresh = self.is_fresh();
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return self.save(),
            Err(err) => return Err(err.into()),
        };
        if file.metadata()?.len() == 0 {
            return Ok(());
        }

        let prefix = encode_key(key);
        let spans = find_spans(BufReader::new(&file), prefix.as_bytes())?;
        if spans.is_empty() {
            debug!(path = %self.path.display(), key = %prefix, "key not in file, nothing to erase");
            return Ok(());
        }

        for span in &spans {
            file.seek(SeekFrom::Start(span.start))?;
            io::copy(&mut io::repeat(b'\n').take(span.end - span.start), &mut file)?;
        }
        if self.options.sync {
            file.sync_data()?;
        }

        self.blanks += 1;
        if fresh {
            self.synced = modified(&self.path);
        }
        self.stats.record_write();
        debug!(path = %self.path.display(), key = %prefix, spans = spans.len(), "tombstoned entry");
        Ok(())
    }

    /// Timer callback: deletes `key` only if it still carries `generation`.
    fn expire(&mut self, key: &K, generation: u64) -> Result<()> {
        if self.meta.get(key) != Some(&generation) {
            trace!(generation, "stale expiration timer");
            return Ok(());
        }
        self.meta.remove(key);
        if self.data.remove(key).is_some() {
            self.clean(key)?;
            debug!(path = %self.path.display(), generation, "expired entry");
        }
        Ok(())
    }
}

/// Byte ranges of every entry starting with `prefix`: the key line plus its
/// indented continuation lines. Blank lines inside a block are included;
/// blank lines after it are not.
fn find_spans<R: BufRead>(mut reader: R, prefix: &[u8]) -> io::Result<Vec<Range<u64>>> {
    let mut spans = Vec::new();
    let mut open: Option<Range<u64>> = None;
    let mut offset = 0;
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        let start = offset;
        offset += read as u64;

        if let Some(span) = open.as_mut() {
            match line.first() {
                Some(b' ' | b'\t') => {
                    span.end = offset;
                    continue;
                }
                Some(b'\n' | b'\r') => continue,
                _ => spans.extend(open.take()),
            }
        }
        if line.starts_with(prefix) {
            open = Some(start..offset);
        }
    }
    spans.extend(open);
    Ok(spans)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn copy_permissions(tmp: &File, path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(meta) => tmp.set_permissions(meta.permissions()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => default_permissions(tmp),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn default_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;
    use crate::codec::{to_node, Node};
    use crate::error::FormatError;
    use tempfile::TempDir;

    fn db(dir: &TempDir) -> PathBuf {
        dir.path().join("db.txt")
    }

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, String> = Store::open(db(&dir)).unwrap();

        assert_eq!(store.size(), 0);
        assert!(db(&dir).exists());
        assert_eq!(fs::read(db(&dir)).unwrap(), b"");
    }

    #[test]
    fn test_write_paths() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, String> = Store::open(&path).unwrap();

        store.set("a".to_string(), "1".to_string()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\": \"1\"\n");

        store.set("b".to_string(), "2".to_string()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\": \"1\"\n\"b\": \"2\"\n");

        store.set("a".to_string(), "9".to_string()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\": \"9\"\n\"b\": \"2\"\n");

        store.del(&"b".to_string()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("\"a\": \"9\"\n{}", "\n".repeat(9)));

        let reopened: Store<String, String> = Store::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["a".to_string()]);
        assert_eq!(reopened.get(&"a".to_string()).unwrap(), "9");
    }

    #[test]
    fn test_del_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let store: Store<u32, u32> = Store::open(db(&dir)).unwrap();
        store.set(1, 1).unwrap();
        let writes = store.stats().writes();

        store.del(&2).unwrap();
        assert_eq!(store.stats().writes(), writes);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_compaction_resets_blanks() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<u32, String> = Store::open(&path).unwrap();
        for i in 0..20 {
            store.set(i, format!("value-{}", i)).unwrap();
        }
        let full_len = fs::metadata(&path).unwrap().len();

        store.del(&0).unwrap();
        store.del(&1).unwrap();
        assert_eq!(store.inner.read().blanks, 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), full_len);

        // 2 * 10 > 17 entries
        store.del(&2).unwrap();
        assert_eq!(store.inner.read().blanks, 0);
        assert!(fs::metadata(&path).unwrap().len() < full_len);
        assert!(!fs::read_to_string(&path).unwrap().contains("\n\n"));

        let reopened: Store<u32, String> = Store::open(&path).unwrap();
        assert_eq!(reopened.keys(), (3..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_nested_entry_tombstone() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, Node> = Store::open(&path).unwrap();

        store.set("a".to_string(), to_node(&[1, 2, 3]).unwrap()).unwrap();
        store.set("b".to_string(), to_node(&[[4], [5]]).unwrap()).unwrap();
        store.set("c".to_string(), to_node("x").unwrap()).unwrap();
        let len = fs::metadata(&path).unwrap().len();

        store.del(&"b".to_string()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), len);

        let reopened: Store<String, Node> = Store::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(reopened.get(&"a".to_string()).unwrap(), to_node(&[1, 2, 3]).unwrap());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, String> = Store::open(db(&dir))
            .unwrap()
            .with_ttl(Duration::from_secs(60));
        store.set("k".to_string(), "v".to_string()).unwrap();

        let current = store.inner.read().meta["k"];
        store.inner.write().expire(&"k".to_string(), current + 1).unwrap();
        assert_eq!(store.get(&"k".to_string()).unwrap(), "v");

        store.inner.write().expire(&"k".to_string(), current).unwrap();
        assert!(store.try_get(&"k".to_string()).unwrap().is_none());
        assert!(store.inner.read().meta.is_empty());
    }

    #[test]
    fn test_set_without_ttl_disarms_expiration() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, String> = Store::open(db(&dir))
            .unwrap()
            .with_ttl(Duration::from_secs(60));
        store.set("k".to_string(), "v".to_string()).unwrap();
        assert_eq!(store.inner.read().meta.len(), 1);

        let store = store.with_ttl(Duration::ZERO);
        store.set("k".to_string(), "w".to_string()).unwrap();
        assert!(store.inner.read().meta.is_empty());
    }

    #[test]
    fn test_external_change_is_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, String> = Store::open(&path).unwrap();
        store.set("a".to_string(), "1".to_string()).unwrap();

        thread::sleep(Duration::from_millis(50));
        fs::write(&path, "\"a\": \"x\"\n\"c\": \"3\"\n").unwrap();

        assert_eq!(store.get(&"c".to_string()).unwrap(), "3");
        assert_eq!(store.get(&"a".to_string()).unwrap(), "x");
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn test_unchanged_file_is_not_reread() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, i64> = Store::open(db(&dir)).unwrap();
        store.set("a".to_string(), 1).unwrap();
        store.set("b".to_string(), 2).unwrap();
        let reads = store.stats().reads();

        for _ in 0..5 {
            assert_eq!(store.get(&"a".to_string()).unwrap(), 1);
            store.load().unwrap();
        }
        assert_eq!(store.stats().reads(), reads);
    }

    #[test]
    fn test_missing_file_is_recreated() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, i64> = Store::open(&path).unwrap();
        store.set("a".to_string(), 1).unwrap();

        fs::remove_file(&path).unwrap();
        assert_eq!(store.get(&"a".to_string()).unwrap(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\": 1\n");
    }

    #[test]
    fn test_append_adds_missing_newline() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        fs::write(&path, "\"a\": 1").unwrap();

        let store: Store<String, i64> = Store::open(&path).unwrap();
        store.set("b".to_string(), 2).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "\"a\": 1\n\"b\": 2\n");
    }

    #[test]
    fn test_corrupt_file_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        fs::write(&path, "\"a\": 1\n\"b\" 2\n").unwrap();

        let result: Result<Store<String, i64>> = Store::open(&path);
        match result {
            Err(Error::Format(err)) => assert_eq!(err.line(), 2),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("corrupt file opened"),
        }
        assert!(matches!(
            Store::<String, String>::open(&path),
            Err(Error::Format(FormatError::UnexpectedToken { line: 2, .. }))
        ));
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store: Store<String, i64> = Store::open(db(&dir)).unwrap();
        store.set("a".to_string(), 1).unwrap();
        store.set("a".to_string(), 2).unwrap();
        store.save().unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("db.txt")]);
    }

    #[test]
    fn test_failed_rewrite_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, i64> = Store::open(&path).unwrap();
        store.set("a".to_string(), 1).unwrap();

        // A non-empty directory cannot be replaced by a rename.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(matches!(store.save(), Err(Error::Io(_))));
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("db.txt")]);
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let store: Store<String, i64> = Store::open(&path).unwrap();
        store.set("a".to_string(), 1).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_find_spans() {
        let text = b"\"a\": 1\n\"b\":\n  - 1\n\n  - 2\n\n\"c\": 3\n\"b\": 4\n";
        let spans = find_spans(&text[..], b"\"b\":").unwrap();
        assert_eq!(spans, vec![7..25, 33..40]);
        assert!(find_spans(&text[..], b"\"d\":").unwrap().is_empty());
        assert_eq!(find_spans(&b"1: 1\n10: 2"[..], b"10:").unwrap(), vec![5..10]);
    }

    #[test]
    fn test_tombstone_blanks_every_duplicate() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        fs::write(&path, "\"a\": 1\n\"b\":\n  - 2\n\"c\": 3\n\"b\": 4\n").unwrap();

        let store: Store<String, Node> = Store::open(&path).unwrap();
        store.del(&"b".to_string()).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("\"a\": 1\n{}\"c\": 3\n{}", "\n".repeat(11), "\n".repeat(7))
        );

        let reopened: Store<String, Node> = Store::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_unconvertible_value_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, BTreeMap<Vec<u8>, i32>> = Store::open(&path)
            .unwrap()
            .with_ttl(Duration::from_secs(60));
        let mut bad = BTreeMap::new();
        bad.insert(vec![1], 1);

        assert!(matches!(store.set("k".to_string(), bad.clone()), Err(Error::Value(_))));
        {
            let state = store.inner.read();
            assert!(state.data.is_empty());
            assert!(state.meta.is_empty());
            assert_eq!(state.generation, 0);
            assert!(state.expiry.is_none());
        }

        store.set("k".to_string(), BTreeMap::new()).unwrap();
        let before = fs::read(&path).unwrap();
        assert!(matches!(store.set("k".to_string(), bad.clone()), Err(Error::Value(_))));
        assert!(matches!(store.set("j".to_string(), bad), Err(Error::Value(_))));

        assert_eq!(store.keys(), vec!["k".to_string()]);
        assert!(store.get(&"k".to_string()).unwrap().is_empty());
        assert_eq!(store.inner.read().generation, 1);
        assert_eq!(store.inner.read().meta.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_expiration_io_error_is_contained() {
        let dir = TempDir::new().unwrap();
        let path = db(&dir);
        let store: Store<String, i64> = Store::open(&path)
            .unwrap()
            .with_ttl(Duration::from_millis(50));
        store.set("a".to_string(), 1).unwrap();

        // The timer's tombstone write fails: the path is now a directory.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(store.size(), 0);
        assert!(store.inner.read().meta.is_empty());

        fs::remove_dir_all(&path).unwrap();
        let store = store.with_ttl(Duration::ZERO);
        store.set("b".to_string(), 2).unwrap();
        assert_eq!(store.get(&"b".to_string()).unwrap(), 2);

        // The scheduler outlived the failure and still fires.
        let store = store.with_ttl(Duration::from_millis(50));
        store.set("c".to_string(), 3).unwrap();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(store.keys(), vec!["b".to_string()]);

        let reopened: Store<String, i64> = Store::open(&path).unwrap();
        assert_eq!(reopened.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_clones_share_state() {
        let dir = TempDir::new().unwrap();
        let store: Store<u8, bool> = Store::open(db(&dir)).unwrap();
        let other = store.clone();
        store.set(1, true).unwrap();
        assert!(other.get(&1).unwrap());
        assert!(other.get(&2).unwrap_err().is_not_found());
    }
}
