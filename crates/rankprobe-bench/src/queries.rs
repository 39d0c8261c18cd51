//! Query files: UTF-8 text, one decimal key per line.
//!
//! Order is preserved and duplicates are kept, since both affect cache
//! behaviour during a run. Blank lines are skipped.

use crate::{BenchError, Result};
use rankprobe_store::Key;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Parse a query file.
///
/// The first malformed line aborts with `BenchError::QueryParse`; no
/// partial query set is returned.
pub fn load_queries<K: Key>(path: impl AsRef<Path>) -> Result<Vec<K>> {
    let path = path.as_ref();
    let io_err = |source| BenchError::QueryIo {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut queries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let key = text.parse::<K>().map_err(|_| BenchError::QueryParse {
            path: path.to_path_buf(),
            line: index + 1,
            content: text.to_string(),
        })?;
        queries.push(key);
    }

    debug!("Parsed {} {} queries from {}", queries.len(), K::WIDTH, path.display());
    Ok(queries)
}

/// Write `queries` to `path`, one per line.
pub fn write_queries<K: Key>(path: impl AsRef<Path>, queries: &[K]) -> Result<()> {
    let path = path.as_ref();
    let out_err = |source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(out_err)?);
    for key in queries {
        writeln!(writer, "{key}").map_err(out_err)?;
    }
    writer.flush().map_err(out_err)
}
