//! Splits a JSONL file into fixed-size chunk files.
//!
//! Every non-blank line is one record. Records are copied byte for byte into
//! `{input}_chunk_{n}.jsonl` files (n starts at 1), at most `chunk_size` per file,
//! preserving order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::BatchError;
use crate::state_machine::WorkUnit;

/// Path of the `n`-th chunk for `input`.
pub fn chunk_path(input: &Path, n: usize) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(format!("_chunk_{n}.jsonl"));
    PathBuf::from(name)
}

/// Splits `input` into chunk files and returns one pending [`WorkUnit`] per file.
///
/// The blocking file work runs on the tokio blocking pool.
pub async fn split_file(input: &Path, chunk_size: usize) -> Result<Vec<WorkUnit>, BatchError> {
    if chunk_size == 0 {
        return Err(BatchError::InvalidChunkSize(chunk_size));
    }
    let source = input.to_owned();
    tokio::task::spawn_blocking(move || split_file_blocking(&source, chunk_size))
        .await
        .map_err(|e| BatchError::io(input, std::io::Error::other(e)))?
}

fn split_file_blocking(input: &Path, chunk_size: usize) -> Result<Vec<WorkUnit>, BatchError> {
    let file = File::open(input).map_err(|e| BatchError::io(input, e))?;
    let mut reader = BufReader::new(file);

    let mut units = Vec::new();
    let mut writer: Option<ChunkWriter> = None;
    let mut line = Vec::with_capacity(4096);

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| BatchError::io(input, e))?;
        if read == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let mut current = match writer.take() {
            Some(w) => w,
            None => ChunkWriter::create(chunk_path(input, units.len() + 1))?,
        };
        current.write_record(&line)?;

        if current.records == chunk_size {
            units.push(current.finish(units.len() + 1)?);
        } else {
            writer = Some(current);
        }
    }

    if let Some(last) = writer.take() {
        units.push(last.finish(units.len() + 1)?);
    }

    tracing::info!(
        input = %input.display(),
        chunk_size,
        chunks = units.len(),
        records = units.iter().map(|u| u.records).sum::<usize>(),
        "split input into chunks"
    );
    Ok(units)
}

struct ChunkWriter {
    path: PathBuf,
    out: BufWriter<File>,
    records: usize,
}

impl ChunkWriter {
    fn create(path: PathBuf) -> Result<Self, BatchError> {
        let file = File::create(&path).map_err(|e| BatchError::io(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            records: 0,
        })
    }

    fn write_record(&mut self, line: &[u8]) -> Result<(), BatchError> {
        self.out
            .write_all(line)
            .map_err(|e| BatchError::io(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    fn finish(mut self, index: usize) -> Result<WorkUnit, BatchError> {
        self.out.flush().map_err(|e| BatchError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), records = self.records, "wrote chunk");
        Ok(WorkUnit::new(index, self.path, self.records))
    }
}
