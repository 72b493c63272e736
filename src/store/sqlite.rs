// ==============================================================================
// store/sqlite.rs - SQLite Genotype Store
// ==============================================================================
// Description: Chunked on-disk genotype store; indexed range reads through a
//              small connection pool, batched-transaction ingestion
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Schema:
//   metadata(key, value)                      format_version, ploidy, samples, created_at
//   contigs(idx, name, length)                store order
//   sites(contig, position, ref_allele, alt_alleles, class,
//         alleles, depths, qualities)         JSON call arrays, PK (contig, position)
// ==============================================================================

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{check_range, ContigInfo, GenotypeSlice, GenotypeStore, StoreBuilder, StoreError};
use crate::models::{Site, VariantClass};

const FORMAT_VERSION: &str = "1";
const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Read-only SQLite genotype store
pub struct SqliteStore {
    path: PathBuf,
    samples: Vec<String>,
    ploidy: usize,
    contigs: Vec<ContigInfo>,
    pool: Mutex<Vec<Connection>>,
}

impl SqliteStore {
    /// Open an existing store
    ///
    /// # Arguments
    /// * `path` - Store file produced by `SqliteStoreBuilder`
    ///
    /// # Returns
    /// * `Ok(SqliteStore)` - Store with samples and contigs loaded
    /// * `Err(StoreError)` - Missing file, wrong format version or corrupt metadata
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Genotype store not found: {}", path.display()),
            )));
        }

        let conn = open_read_only(&path)?;

        let version = get_metadata(&conn, "format_version")?
            .ok_or_else(|| StoreError::Corrupt("missing format_version".to_string()))?;
        if version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported store format version {}",
                version
            )));
        }

        let ploidy: usize = get_metadata(&conn, "ploidy")?
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StoreError::Corrupt("missing or invalid ploidy".to_string()))?;

        let samples: Vec<String> = match get_metadata(&conn, "samples")? {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(StoreError::Corrupt("missing sample list".to_string())),
        };

        let contigs = {
            let mut stmt = conn.prepare("SELECT name, length FROM contigs ORDER BY idx")?;
            let rows = stmt.query_map([], |row| {
                Ok(ContigInfo {
                    name: row.get(0)?,
                    length: row.get::<_, i64>(1)? as u64,
                })
            })?;
            let list = rows.collect::<Result<Vec<_>, _>>()?;
            list
        };

        info!(
            "Opened genotype store {:?}: {} samples, {} contigs, ploidy {}",
            path,
            samples.len(),
            contigs.len(),
            ploidy
        );

        Ok(Self {
            path,
            samples,
            ploidy,
            contigs,
            pool: Mutex::new(vec![conn]),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of stored sites
    pub fn site_count(&self) -> Result<u64, StoreError> {
        let conn = self.acquire()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn acquire(&self) -> Result<PooledConnection<'_>, StoreError> {
        let existing = self
            .pool
            .lock()
            .map_err(|_| StoreError::Corrupt("connection pool poisoned".to_string()))?
            .pop();

        let conn = match existing {
            Some(conn) => conn,
            None => {
                debug!("Opening additional store connection");
                open_read_only(&self.path)?
            }
        };

        Ok(PooledConnection {
            pool: &self.pool,
            conn: Some(conn),
        })
    }
}

/// Connection checked out of the pool; returned on drop
struct PooledConnection<'a> {
    pool: &'a Mutex<Vec<Connection>>,
    conn: Option<Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection already returned to the pool"),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let (Some(conn), Ok(mut pool)) = (self.conn.take(), self.pool.lock()) {
            pool.push(conn);
        }
    }
}

fn open_read_only(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

impl GenotypeStore for SqliteStore {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn ploidy(&self) -> usize {
        self.ploidy
    }

    fn contigs(&self) -> Vec<ContigInfo> {
        self.contigs.clone()
    }

    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<GenotypeSlice, StoreError> {
        let length = self.contig_length(contig)?;
        check_range(contig, start, end, length)?;

        let conn = self.acquire()?;
        let mut stmt = conn.prepare_cached(
            "SELECT position, class, alleles, depths, qualities
             FROM sites
             WHERE contig = ?1 AND position >= ?2 AND position < ?3
             ORDER BY position",
        )?;

        let mut slice = GenotypeSlice::new(contig, self.samples.len(), self.ploidy);
        let mut rows = stmt.query(params![contig, start as i64, end as i64])?;

        while let Some(row) = rows.next()? {
            let position = row.get::<_, i64>(0)? as u64;
            let class_text: String = row.get(1)?;
            let class = VariantClass::parse(&class_text).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "unknown variant class '{}' at {}:{}",
                    class_text, contig, position
                ))
            })?;

            let alleles: Vec<i16> = serde_json::from_str(&row.get::<_, String>(2)?)?;
            let depths: Vec<Option<u32>> = serde_json::from_str(&row.get::<_, String>(3)?)?;
            let qualities: Vec<Option<f32>> = serde_json::from_str(&row.get::<_, String>(4)?)?;

            slice.push_site(&Site {
                contig: contig.to_string(),
                position,
                ref_allele: String::new(),
                alt_alleles: Vec::new(),
                class,
                alleles,
                depths,
                qualities,
            })?;
        }

        debug!(
            "Fetched {} sites from {}:{}-{}",
            slice.len(),
            contig,
            start,
            end
        );
        Ok(slice)
    }
}

/// Writes ingested sites into a new SQLite store in batched transactions
pub struct SqliteStoreBuilder {
    path: PathBuf,
    conn: Connection,
    ploidy: usize,
    batch_size: usize,
    started: bool,
    n_samples: usize,
    contigs: Vec<ContigInfo>,
    max_position: HashMap<String, u64>,
    pending: Vec<Site>,
    written: u64,
    duplicates: u64,
}

impl SqliteStoreBuilder {
    /// Create a new store file, replacing any existing file at `path`
    pub fn create<P: AsRef<Path>>(path: P, ploidy: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            warn!("Replacing existing genotype store {:?}", path);
            std::fs::remove_file(&path)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;

             CREATE TABLE metadata (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );

             CREATE TABLE contigs (
                 idx INTEGER PRIMARY KEY,
                 name TEXT NOT NULL UNIQUE,
                 length INTEGER NOT NULL
             );

             CREATE TABLE sites (
                 contig TEXT NOT NULL,
                 position INTEGER NOT NULL,
                 ref_allele TEXT NOT NULL,
                 alt_alleles TEXT NOT NULL,
                 class TEXT NOT NULL,
                 alleles TEXT NOT NULL,
                 depths TEXT NOT NULL,
                 qualities TEXT NOT NULL,
                 PRIMARY KEY (contig, position)
             ) WITHOUT ROWID;",
        )?;

        Ok(Self {
            path,
            conn,
            ploidy,
            batch_size: DEFAULT_BATCH_SIZE,
            started: false,
            n_samples: 0,
            contigs: Vec::new(),
            max_position: HashMap::new(),
            pending: Vec::new(),
            written: 0,
            duplicates: 0,
        })
    }

    /// Sites per insert transaction
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO sites
                 (contig, position, ref_allele, alt_alleles, class, alleles, depths, qualities)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for site in &self.pending {
                let inserted = stmt.execute(params![
                    site.contig,
                    site.position as i64,
                    site.ref_allele,
                    site.alt_alleles.join(","),
                    site.class.as_str(),
                    serde_json::to_string(&site.alleles)?,
                    serde_json::to_string(&site.depths)?,
                    serde_json::to_string(&site.qualities)?,
                ])?;
                if inserted == 0 {
                    self.duplicates += 1;
                } else {
                    self.written += 1;
                }
            }
        }
        tx.commit()?;

        debug!("Committed batch of {} sites", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    fn register_contig(&mut self, name: &str, length: u64) -> Result<(), StoreError> {
        let idx = self.contigs.len() as i64;
        self.conn.execute(
            "INSERT INTO contigs (idx, name, length) VALUES (?1, ?2, ?3)",
            params![idx, name, length as i64],
        )?;
        self.contigs.push(ContigInfo {
            name: name.to_string(),
            length,
        });
        Ok(())
    }
}

impl StoreBuilder for SqliteStoreBuilder {
    type Store = SqliteStore;

    fn begin(&mut self, samples: &[String], contigs: &[ContigInfo]) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")?;
        stmt.execute(params!["format_version", FORMAT_VERSION])?;
        stmt.execute(params!["ploidy", self.ploidy.to_string()])?;
        stmt.execute(params!["samples", serde_json::to_string(samples)?])?;
        stmt.execute(params!["created_at", chrono::Utc::now().to_rfc3339()])?;
        drop(stmt);

        for contig in contigs {
            self.register_contig(&contig.name, contig.length)?;
        }

        self.n_samples = samples.len();
        self.started = true;
        Ok(())
    }

    fn push_site(&mut self, site: Site) -> Result<(), StoreError> {
        if !self.started {
            return Err(StoreError::NotStarted);
        }

        let expected = self.n_samples * self.ploidy;
        if site.alleles.len() != expected {
            return Err(StoreError::CallCountMismatch {
                contig: site.contig.clone(),
                position: site.position,
                found: site.alleles.len(),
                expected,
            });
        }

        if !self.contigs.iter().any(|c| c.name == site.contig) {
            self.register_contig(&site.contig, 0)?;
        }

        let max = self.max_position.entry(site.contig.clone()).or_insert(0);
        *max = (*max).max(site.position);

        self.pending.push(site);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<SqliteStore, StoreError> {
        if !self.started {
            return Err(StoreError::NotStarted);
        }
        self.flush()?;

        // Contigs without a header length span up to their last site
        for contig in self.contigs.iter().filter(|c| c.length == 0) {
            if let Some(max) = self.max_position.get(&contig.name) {
                self.conn.execute(
                    "UPDATE contigs SET length = ?1 WHERE name = ?2",
                    params![(*max + 1) as i64, contig.name],
                )?;
            }
        }

        if self.duplicates > 0 {
            warn!("Ignored {} duplicate site records (first record kept)", self.duplicates);
        }
        info!("Genotype store written: {} sites", self.written);

        let path = self.path.clone();
        drop(self);
        SqliteStore::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::tempdir;

    fn site(contig: &str, position: u64, alleles: Vec<i16>) -> Site {
        Site {
            contig: contig.to_string(),
            position,
            ref_allele: "C".to_string(),
            alt_alleles: vec!["T".to_string()],
            class: VariantClass::BiallelicSnp,
            alleles,
            depths: vec![Some(12), None],
            qualities: vec![Some(40.0), None],
        }
    }

    fn samples() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn sites() -> Vec<Site> {
        vec![
            site("chr1", 99, vec![0, 1, 0, 0]),
            site("chr1", 100, vec![1, 1, -1, -1]),
            site("chr1", 4999, vec![0, 0, 0, 0]),
            site("chr2", 7, vec![0, 1, 1, 1]),
        ]
    }

    fn build(path: &Path, batch: usize) -> SqliteStore {
        let mut builder = SqliteStoreBuilder::create(path, 2)
            .unwrap()
            .with_batch_size(batch);
        builder
            .begin(
                &samples(),
                &[ContigInfo {
                    name: "chr1".to_string(),
                    length: 5000,
                }],
            )
            .unwrap();
        for s in sites() {
            builder.push_site(s).unwrap();
        }
        builder.finish().unwrap()
    }

    #[test]
    fn test_store_roundtrip_through_fetch() {
        let dir = tempdir().unwrap();
        let store = build(&dir.path().join("genotypes.db"), 2);

        assert_eq!(store.samples(), samples().as_slice());
        assert_eq!(store.ploidy(), 2);
        assert_eq!(store.site_count().unwrap(), 4);
        assert_eq!(
            store.contigs(),
            vec![
                ContigInfo {
                    name: "chr1".to_string(),
                    length: 5000
                },
                ContigInfo {
                    name: "chr2".to_string(),
                    length: 8
                },
            ]
        );

        let slice = store.fetch("chr1", 100, 5000).unwrap();
        assert_eq!(slice.positions, vec![100, 4999]);
        assert_eq!(slice.call(0, 1), &[-1, -1]);
        assert_eq!(slice.depth(0, 0), Some(12));
        assert_eq!(slice.quality(0, 1), None);
    }

    #[test]
    fn test_sqlite_matches_memory_store() {
        let dir = tempdir().unwrap();
        let sqlite = build(&dir.path().join("genotypes.db"), 1000);
        let memory = MemoryStore::from_sites(
            samples(),
            2,
            vec![ContigInfo {
                name: "chr1".to_string(),
                length: 5000,
            }],
            sites(),
        )
        .unwrap();

        for (start, end) in [(0, 5000), (0, 100), (99, 101)] {
            let a = sqlite.fetch("chr1", start, end).unwrap();
            let b = memory.fetch("chr1", start, end).unwrap();
            assert_eq!(a.positions, b.positions);
            assert_eq!(a.alleles, b.alleles);
            assert_eq!(a.classes, b.classes);
        }
    }

    #[test]
    fn test_fetch_range_errors() {
        let dir = tempdir().unwrap();
        let store = build(&dir.path().join("genotypes.db"), 10);

        assert!(matches!(
            store.fetch("chrX", 0, 10),
            Err(StoreError::Range(_))
        ));
        assert!(matches!(
            store.fetch("chr2", 0, 9),
            Err(StoreError::Range(_))
        ));
    }

    #[test]
    fn test_concurrent_readers() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(build(&dir.path().join("genotypes.db"), 10));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.fetch("chr1", 0, 5000).map(|s| s.len()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 3);
        }
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempdir().unwrap();
        assert!(SqliteStore::open(dir.path().join("absent.db")).is_err());
    }
}
