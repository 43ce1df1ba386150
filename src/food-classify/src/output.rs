use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use food_serve::{Error, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

/// File name pattern for result documents, local time to the second.
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y_%H-%M-%S";

pub fn result_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}.json", now.format(TIMESTAMP_FORMAT)))
}

/// Write `json` into `dir` (created if needed) under a timestamped name,
/// indented by four spaces.
pub fn write_result(dir: &Path, json: &Value, now: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let path = result_path(dir, now);
    let mut out = BufWriter::new(File::create(&path)?);

    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    json.serialize(&mut ser)
        .map_err(|e| Error::Internal(format!("could not write {}: {}", path.display(), e)))?;
    out.flush()?;

    Ok(path)
}
