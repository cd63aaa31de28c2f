// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-locale full-text index on SQLite FTS5.
//!
//! Each locale lives in its own database file. A rebuild replaces every row
//! inside one `BEGIN IMMEDIATE` transaction; readers run on their own WAL
//! snapshot and see either the previous or the new index, never a mix.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::analysis::Analyzer;
use crate::model::IndexStats;
use crate::model::IndexedDocument;
use crate::model::RawHit;
use crate::model::RawSearchResult;
use crate::model::RebuildReport;
use crate::query::ParsedQuery;
use crate::snippet::build_snippet;

/// Id of the row carrying the index build stamp. It has no full-text row.
pub const METADATA_ID: &str = "___metadata";

const SCHEMA_VERSION: i64 = 1;
const LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    pub title: f64,
    pub body: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 2.0,
            body: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OpenMode {
    Read,
    Write,
}

struct WriterLock {
    _file: File,
}

#[derive(Debug)]
pub struct IndexStore {
    root: PathBuf,
    weights: FieldWeights,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>, weights: FieldWeights) -> Self {
        Self {
            root: root.into(),
            weights,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self, locale: &str) -> PathBuf {
        self.root.join(format!("{}.db", encode_locale(locale)))
    }

    pub fn exists(&self, locale: &str) -> bool {
        self.index_path(locale).exists()
    }

    /// Locales with an index file under the root, sorted.
    pub fn locales(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut locales = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("read index dir {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("db") {
                if let Some(locale) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_locale)
                {
                    locales.push(locale);
                }
            }
        }
        locales.sort();
        Ok(locales)
    }

    fn writer(&self, locale: &str) -> Arc<Mutex<()>> {
        self.writers
            .lock()
            .entry(encode_locale(locale))
            .or_default()
            .clone()
    }

    /// Replaces the whole index for `locale` with `docs` and a fresh build
    /// stamp. Later duplicates of an id replace earlier ones.
    pub fn rebuild(&self, locale: &str, docs: &[IndexedDocument]) -> Result<RebuildReport> {
        let writer = self.writer(locale);
        let _guard = writer.lock();
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create index dir {}", self.root.display()))?;
        let path = self.index_path(locale);
        let _lock = acquire_lock(&path)?;
        let mut conn = open_for_write(&path)?;

        let analyzer = Analyzer::for_locale(locale);
        let built_at = OffsetDateTime::now_utc();
        let stamp = built_at.format(&Rfc3339).context("format build stamp")?;

        let mut latest: HashMap<&str, usize> = HashMap::new();
        for (idx, doc) in docs.iter().enumerate() {
            latest.insert(doc.id.as_str(), idx);
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin rebuild")?;
        reset_outdated_schema(&tx)?;
        create_schema(&tx)?;
        tx.execute("DELETE FROM doc_fts", []).context("clear doc_fts")?;
        tx.execute("DELETE FROM doc", []).context("clear doc")?;
        let mut documents = 0usize;
        {
            let mut insert_doc = tx.prepare(
                "INSERT INTO doc (id, title, roles, body, built_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_fts =
                tx.prepare("INSERT INTO doc_fts (rowid, title, body) VALUES (?1, ?2, ?3)")?;
            for (idx, doc) in docs.iter().enumerate() {
                if doc.id == METADATA_ID || latest.get(doc.id.as_str()) != Some(&idx) {
                    continue;
                }
                let roles = serde_json::to_string(&doc.roles).context("serialize roles")?;
                let rowid = insert_doc
                    .insert(params![doc.id, doc.title, roles, doc.body, stamp])
                    .with_context(|| format!("insert {}", doc.id))?;
                insert_fts
                    .execute(params![
                        rowid,
                        analyzer.analyze(&doc.title),
                        analyzer.analyze(&doc.body)
                    ])
                    .with_context(|| format!("index {}", doc.id))?;
                documents += 1;
            }
        }
        tx.execute(
            "INSERT INTO doc (id, title, roles, body, built_at) VALUES (?1, '', '[]', '', ?2)",
            params![METADATA_ID, stamp],
        )
        .context("write metadata marker")?;
        set_meta(&tx, "schema_version", &SCHEMA_VERSION.to_string())?;
        set_meta(&tx, "analyzer", analyzer.language().as_label())?;
        tx.commit().context("commit rebuild")?;

        info!(locale = %locale, docs = documents, built_at = %stamp, "index rebuilt");
        Ok(RebuildReport {
            documents,
            built_at,
        })
    }

    /// Build stamp of the locale index. Missing, unreadable, or
    /// differently-analyzed indexes report `None`.
    pub fn built_at(&self, locale: &str) -> Option<OffsetDateTime> {
        match self.read_built_at(locale) {
            Ok(stamp) => stamp,
            Err(err) => {
                debug!(locale = %locale, error = %format!("{err:#}"), "index build stamp unreadable");
                None
            }
        }
    }

    fn read_built_at(&self, locale: &str) -> Result<Option<OffsetDateTime>> {
        let path = self.index_path(locale);
        if !path.exists() {
            return Ok(None);
        }
        let conn = open_connection(&path, OpenMode::Read)?;
        if !table_exists(&conn, "meta")? || !table_exists(&conn, "doc")? {
            return Ok(None);
        }
        let expected = Analyzer::for_locale(locale).language().as_label();
        let analyzer = get_meta(&conn, "analyzer")?;
        if analyzer.as_deref() != Some(expected) {
            debug!(locale = %locale, found = ?analyzer, expected, "index analyzer mismatch");
            return Ok(None);
        }
        let stamp: Option<String> = conn
            .query_row(
                "SELECT built_at FROM doc WHERE id = ?1",
                params![METADATA_ID],
                |row| row.get(0),
            )
            .optional()
            .context("read metadata marker")?;
        Ok(stamp.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()))
    }

    /// Ranked query over title and body. An absent index, or a query with no
    /// searchable terms, yields an empty result.
    pub fn query(
        &self,
        locale: &str,
        text: &str,
        limit: usize,
        snippet_chars: usize,
    ) -> Result<RawSearchResult> {
        let path = self.index_path(locale);
        if !path.exists() {
            return Ok(RawSearchResult::default());
        }
        let analyzer = Analyzer::for_locale(locale);
        let parsed = ParsedQuery::parse(text, &analyzer);
        let Some(expr) = parsed.to_match_expression() else {
            return Ok(RawSearchResult::default());
        };

        let mut conn = open_connection(&path, OpenMode::Read)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .context("begin query")?;
        if !table_exists(&tx, "doc_fts")? {
            return Ok(RawSearchResult::default());
        }
        let total: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM doc_fts WHERE doc_fts MATCH ?1",
                params![expr],
                |row| row.get(0),
            )
            .with_context(|| format!("count matches for {expr}"))?;

        let sql = format!(
            "SELECT doc.id, doc.title, doc.roles, doc.body\n         FROM doc_fts\n         JOIN doc ON doc.rowid = doc_fts.rowid\n         WHERE doc_fts MATCH ?1 AND doc.id != ?2\n         ORDER BY bm25(doc_fts, {:.3}, {:.3}) ASC, doc.rowid ASC\n         LIMIT ?3",
            self.weights.title, self.weights.body
        );
        let terms = parsed.highlight_terms();
        let mut hits = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![expr, METADATA_ID, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (id, title, roles, body) = row?;
                let roles: BTreeSet<String> = serde_json::from_str(&roles)
                    .with_context(|| format!("parse roles of {id}"))?;
                let title = if title.trim().is_empty() {
                    id.clone()
                } else {
                    title
                };
                hits.push(RawHit {
                    snippet: build_snippet(&body, &analyzer, &terms, snippet_chars),
                    id,
                    title,
                    roles,
                });
            }
        }
        tx.commit().context("end query")?;
        Ok(RawSearchResult {
            total: usize::try_from(total).unwrap_or_default(),
            hits,
        })
    }

    /// Removes the locale index. Returns whether there was one.
    pub fn delete(&self, locale: &str) -> Result<bool> {
        let writer = self.writer(locale);
        let _guard = writer.lock();
        let path = self.index_path(locale);
        if !path.exists() {
            return Ok(false);
        }
        let _lock = acquire_lock(&path)?;
        remove_index_files(&path)?;
        info!(locale = %locale, path = %path.display(), "index deleted");
        Ok(true)
    }

    pub fn stats(&self, locale: &str) -> Result<IndexStats> {
        let path = self.index_path(locale);
        let mut stats = IndexStats {
            locale: locale.to_string(),
            doc_count: 0,
            built_at: None,
            analyzer: None,
            db_size_bytes: 0,
        };
        if !path.exists() {
            return Ok(stats);
        }
        let conn = open_connection(&path, OpenMode::Read)?;
        if table_exists(&conn, "doc")? {
            stats.doc_count = conn
                .query_row(
                    "SELECT COUNT(*) FROM doc WHERE id != ?1",
                    params![METADATA_ID],
                    |row| row.get(0),
                )
                .context("count docs")?;
        }
        if table_exists(&conn, "meta")? {
            stats.analyzer = get_meta(&conn, "analyzer")?;
        }
        stats.built_at = self
            .built_at(locale)
            .and_then(|ts| ts.format(&Rfc3339).ok());
        stats.db_size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok(stats)
    }
}

/// File stem for a locale. Locales compare trimmed and case-insensitively;
/// bytes outside `[a-z0-9_-]` are written as `%xx`, so distinct locales
/// never share a file and [`decode_locale`] recovers the name.
pub fn encode_locale(locale: &str) -> String {
    let normalized = locale.trim().to_lowercase();
    if normalized.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(normalized.len());
    for byte in normalized.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02x}"));
        }
    }
    encoded
}

/// Inverse of [`encode_locale`]; `None` for stems it never produces.
pub fn decode_locale(stem: &str) -> Option<String> {
    if stem == "%" {
        return Some(String::new());
    }
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'%' {
            let hex = tail.get(..2)?;
            let value = u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?;
            bytes.push(value);
            rest = &tail[2..];
        } else {
            bytes.push(first);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

fn open_connection(path: &Path, mode: OpenMode) -> Result<Connection> {
    let flags = match mode {
        OpenMode::Read => OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::Write => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    } | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .with_context(|| format!("open {}", path.display()))?;
    conn.busy_timeout(LOCK_TIMEOUT)
        .context("set busy timeout")?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("set journal_mode")?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!(journal_mode = %mode, "WAL journal mode unavailable");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("set synchronous")?;
    Ok(())
}

/// Opens the index for a rebuild; a file that is not a usable database is
/// discarded and recreated.
fn open_for_write(path: &Path) -> Result<Connection> {
    let first = open_connection(path, OpenMode::Write).and_then(|conn| {
        apply_pragmas(&conn)?;
        Ok(conn)
    });
    match first {
        Ok(conn) => Ok(conn),
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "recreating unreadable index");
            remove_index_files(path)?;
            let conn = open_connection(path, OpenMode::Write)?;
            apply_pragmas(&conn)?;
            Ok(conn)
        }
    }
}

fn remove_index_files(path: &Path) -> Result<()> {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let mut shm = path.as_os_str().to_owned();
    shm.push("-shm");
    for file in [path.to_path_buf(), PathBuf::from(wal), PathBuf::from(shm)] {
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove {}", file.display()));
            }
        }
    }
    Ok(())
}

fn lock_path_for(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .parent()
        .and_then(|dir| dir.canonicalize().ok())
        .and_then(|dir| path.file_name().map(|name| dir.join(name)))
        .unwrap_or_else(|| path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash = hex::encode(hasher.finalize());
    let mut dir = std::env::temp_dir();
    dir.push("storysearch");
    fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
    Ok(dir.join(format!("storysearch-{hash}.lock")))
}

fn acquire_lock(path: &Path) -> Result<WriterLock> {
    let lock_path = lock_path_for(path)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("open lock file {}", lock_path.display()))?;
    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(WriterLock { _file: file }),
            Err(_) if Instant::now() >= deadline => {
                anyhow::bail!(
                    "index is locked for writing; another process may be rebuilding {}",
                    path.display()
                );
            }
            Err(_) => sleep(Duration::from_millis(50)),
        }
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (\n  key TEXT PRIMARY KEY,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS doc (\n  rowid INTEGER PRIMARY KEY,\n  id TEXT UNIQUE NOT NULL,\n  title TEXT NOT NULL,\n  roles TEXT NOT NULL,\n  body TEXT NOT NULL,\n  built_at TEXT NOT NULL\n);\n\nCREATE VIRTUAL TABLE IF NOT EXISTS doc_fts USING fts5(title, body, tokenize='unicode61 remove_diacritics 0');",
    )
    .context("create schema")?;
    Ok(())
}

/// Drops index tables written by a different schema version.
fn reset_outdated_schema(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "meta")? {
        return Ok(());
    }
    let version = get_meta(conn, "schema_version")?
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    warn!(found = version, expected = SCHEMA_VERSION, "resetting index schema");
    conn.execute_batch("DROP TABLE IF EXISTS doc_fts;\nDROP TABLE IF EXISTS doc;\nDELETE FROM meta;")
        .context("reset schema")?;
    Ok(())
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .context("set meta")?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .with_context(|| format!("read meta {key}"))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            params![name],
            |row| row.get(0),
        )
        .context("check table")?;
    Ok(count > 0)
}
