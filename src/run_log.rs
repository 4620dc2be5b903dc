use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::error::{IoContext, Result, TrainerErr};

const SCALARS_FILE: &str = "scalars.jsonl";

#[derive(Serialize)]
struct ScalarRecord<'a> {
    tag: &'a str,
    step: usize,
    wall_time: f64,
    values: BTreeMap<&'a str, f32>,
}

/// An append-only log of scalar summaries, one JSON object per line.
#[derive(Debug)]
pub struct RunLog {
    dir: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Creates `dir` if needed and opens its scalar log for appending.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).at(dir)?;

        let path = dir.join(SCALARS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .at(&path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn scalars_path(&self) -> PathBuf {
        self.dir.join(SCALARS_FILE)
    }

    /// Records a group of related values under `tag` at `step`.
    pub fn add_scalars(&mut self, tag: &str, values: &[(&str, f32)], step: usize) -> Result<()> {
        let path = self.scalars_path();
        let record = ScalarRecord {
            tag,
            step,
            wall_time: Utc::now().timestamp_millis() as f64 / 1000.,
            values: values.iter().copied().collect(),
        };

        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|source| TrainerErr::Json {
                path: path.clone(),
                source,
            })?;
        self.writer.write_all(b"\n").at(path)
    }

    /// Pushes everything written so far to disk.
    pub fn flush(&mut self) -> Result<()> {
        let path = self.scalars_path();
        self.writer.flush().at(path)
    }
}
