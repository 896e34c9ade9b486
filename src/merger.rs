use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::error::SortError;
use crate::record::{try_parse, Record};
use crate::temp_space::TempSpace;

/// Phase 2: fan-in-bounded, possibly multi-pass k-way merge of a set of
/// already internally-sorted run files into a single output file.
pub(crate) struct Merger<'a> {
    config: &'a Config,
    temp_space: &'a TempSpace,
    cancellation: CancellationToken,
}

impl<'a> Merger<'a> {
    pub(crate) fn new(config: &'a Config, temp_space: &'a TempSpace, cancellation: CancellationToken) -> Merger<'a> {
        Merger { config, temp_space, cancellation }
    }

    /// Merge `runs` into `out_path`, looping over fan-in-bounded passes
    /// until at most `fan_in` runs remain, then writing the final pass
    /// straight to `out_path`.
    pub(crate) fn merge(&self, runs: Vec<PathBuf>, out_path: &Path) -> Result<(), SortError> {
        if runs.is_empty() {
            File::create(out_path)
                .with_context(|| format!("create empty output: {}", out_path.display()))
                .map_err(SortError::IoFailure)?;
            return Ok(());
        }

        if runs.len() == 1 {
            std::fs::copy(&runs[0], out_path)
                .with_context(|| format!("copy single run to output: {}", out_path.display()))
                .map_err(SortError::IoFailure)?;
            let _ = std::fs::remove_file(&runs[0]);
            return Ok(());
        }

        let fan_in = self.config.fan_in();
        let mut current = runs;
        let mut pass_number = 0;

        while current.len() > fan_in {
            if self.cancellation.is_cancelled() {
                return Err(SortError::Cancelled);
            }
            pass_number += 1;
            log::info!("merge pass {pass_number}: {} runs, fan-in {fan_in}", current.len());
            let pass_dir = self.temp_space.new_pass_dir()
                .map_err(SortError::Fatal)?;

            let mut next = Vec::new();
            for chunk in current.chunks(fan_in) {
                if self.cancellation.is_cancelled() {
                    return Err(SortError::Cancelled);
                }
                let intermediate_path = pass_dir.path().join(format!("merged-{}.tmp", next.len()));
                self.merge_chunk(chunk, &intermediate_path)?;
                next.push(intermediate_path);
            }

            for path in &current {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("best-effort delete of intermediate run {} failed: {e}", path.display());
                }
            }
            current = next;
        }

        if self.cancellation.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        self.merge_chunk(&current, out_path)?;
        for path in &current {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("best-effort delete of intermediate run {} failed: {e}", path.display());
            }
        }
        Ok(())
    }

    /// K-way merge a single batch of at most `fan_in` runs into `dest`.
    fn merge_chunk(&self, runs: &[PathBuf], dest: &Path) -> Result<(), SortError> {
        let out_file = File::create(dest)
            .with_context(|| format!("create merge destination: {}", dest.display()))
            .map_err(SortError::IoFailure)?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, out_file);

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let mut readers = Vec::with_capacity(runs.len());
        for path in runs {
            let mut run_reader = RunReader::open(path)?;
            if let Some(record) = run_reader.take_head() {
                let idx = readers.len();
                heap.push(HeapEntry { record, reader_idx: idx });
            }
            readers.push(run_reader);
        }

        while let Some(HeapEntry { record, reader_idx }) = heap.pop() {
            if self.cancellation.is_cancelled() {
                return Err(SortError::Cancelled);
            }
            writer.write_all(record.to_line().as_bytes())
                .context("write merged record")
                .map_err(SortError::IoFailure)?;
            if let Some(next) = readers[reader_idx].next_record()? {
                heap.push(HeapEntry { record: next, reader_idx });
            }
        }

        writer.flush().context("flush merge output").map_err(SortError::IoFailure)?;
        writer.get_ref().sync_all().context("fsync merge output").map_err(SortError::IoFailure)?;
        Ok(())
    }
}

/// A single run's buffered reader plus its current head record. The head is
/// authoritative; any copy held by the heap is only the sort key for that
/// head, never a second source of truth.
struct RunReader {
    reader: BufReader<File>,
    line: Vec<u8>,
}

impl RunReader {
    fn open(path: &Path) -> Result<RunReader, SortError> {
        let file = File::open(path)
            .with_context(|| format!("open run: {}", path.display()))
            .map_err(SortError::IoFailure)?;
        Ok(RunReader {
            reader: BufReader::with_capacity(1024 * 1024, file),
            line: Vec::new(),
        })
    }

    /// Advance to, and return, the first valid record in this run.
    fn take_head(&mut self) -> Option<Record> {
        self.next_record().ok().flatten()
    }

    /// Advance past the current head and return the next valid record,
    /// skipping invalid (including non-UTF-8) lines along the way.
    fn next_record(&mut self) -> Result<Option<Record>, SortError> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.line)
                .context("read run line")
                .map_err(SortError::IoFailure)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            let trimmed = self.line.strip_suffix(b"\n").unwrap_or(&self.line);
            match std::str::from_utf8(trimmed) {
                Ok(line) => {
                    if let Some(record) = try_parse(line) {
                        return Ok(Some(record));
                    }
                }
                Err(_) => continue,
            }
        }
    }
}

struct HeapEntry {
    record: Record,
    reader_idx: usize,
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so `BinaryHeap` (a max-heap) pops the smallest record first.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.record.cmp(&self.record)
    }
}
