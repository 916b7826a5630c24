//! Per-table append-structured JSONL log.
//!
//! One JSON object per line, UTF-8, trailing newline after every record.
//! Lines are not ordered; the set on disk is the state (spec.md §6.1).
//! Loading is tolerant: a line that fails to parse is skipped with a
//! warning rather than aborting the whole load (spec.md §4.11, §7).
//! Rewrites are atomic: serialize to a sibling `.tmp`, fsync, rename over
//! the target — no `.tmp` survives a successful call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Ensure the JSONL file for a table exists (creating an empty file if
/// absent). A missing file is treated as an empty table, never an error.
pub fn ensure_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        OpenOptions::new().create(true).write(true).open(path)?;
    }
    Ok(())
}

/// Load every well-formed row from a JSONL file. Missing files decode to
/// an empty vec; malformed lines are skipped with a `tracing::warn!`.
pub fn load<T: DeserializeOwned>(path: &Path) -> std::io::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed JSONL line"
                );
            }
        }
    }

    Ok(rows)
}

/// Rewrite a JSONL file from scratch with exactly the given rows, using
/// the write-tmp/fsync/rename protocol from spec.md §5 and §6.1.
pub fn rewrite<T: Serialize>(path: &Path, rows: &[T]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            tmp.write_all(line.as_bytes())?;
            tmp.write_all(b"\n")?;
        }
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        #[serde(default)]
        id: String,
        #[serde(default)]
        n: i64,
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.jsonl");
        let rows: Vec<Row> = load(&path).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.jsonl");
        let rows = vec![
            Row { id: "a".into(), n: 1 },
            Row { id: "b".into(), n: 2 },
        ];
        rewrite(&path, &rows).unwrap();
        assert!(!path.with_extension("jsonl.tmp").exists());
        let loaded: Vec<Row> = load(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.jsonl");
        fs::write(
            &path,
            "{\"id\":\"a\",\"n\":1}\nnot json at all\n{\"id\":\"b\",\"n\":2}\n{{{malformed\n{\"id\":\"c\",\"n\":3}\n",
        )
        .unwrap();
        let rows: Vec<Row> = load(&path).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn rewrite_strips_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.jsonl");
        fs::write(&path, "{\"id\":\"a\",\"n\":1,\"future_field\":\"ignored\"}\n").unwrap();
        let rows: Vec<Row> = load(&path).unwrap();
        rewrite(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("future_field"));
    }
}
