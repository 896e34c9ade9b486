use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use command_executor::command::Command;
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::error::SortError;
use crate::record::{try_parse, Record};
use crate::temp_space::TempSpace;

/// Phase 1: stream the input sequentially on a single reader, batch records
/// up to the run-size budget, and hand each batch to a pool of writer
/// workers that sort it in place and spill it to a fresh run file.
///
/// The worker pool's bounded submit queue doubles as the bounded batch
/// channel: `submit` blocks the reader once every worker is busy and the
/// queue is full.
pub(crate) struct RunBuilder<'a> {
    config: &'a Config,
    temp_space: Arc<TempSpace>,
    cancellation: CancellationToken,
    rejected: Arc<AtomicU64>,
}

impl<'a> RunBuilder<'a> {
    pub(crate) fn new(config: &'a Config, temp_space: Arc<TempSpace>, cancellation: CancellationToken, rejected: Arc<AtomicU64>) -> RunBuilder<'a> {
        RunBuilder { config, temp_space, cancellation, rejected }
    }

    /// Partition and spill `in_paths`, returning the run files produced.
    /// Inputs are read in order, one after another, as a single logical
    /// stream — the run-size watermark is not reset at file boundaries.
    pub(crate) fn build(&self, in_paths: &[PathBuf]) -> Result<Vec<PathBuf>, SortError> {
        let mut pool = ThreadPoolBuilder::new()
            .with_name("run-builder".to_string())
            .with_tasks(self.config.threads())
            .with_queue_size(self.config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()
            .map_err(|e| SortError::Fatal(anyhow!("build run-builder pool: {e}")))?;

        let runs: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        let mut current: Vec<Record> = Vec::new();
        let mut consumed: u64 = 0;
        let budget = self.config.run_size_bytes();
        let mut raw_line: Vec<u8> = Vec::new();
        let mut cancelled = false;

        'inputs: for in_path in in_paths {
            let file = File::open(in_path)
                .map_err(|_| SortError::InputMissing(in_path.to_string_lossy().into_owned()))?;
            let mut reader = BufReader::with_capacity(1024 * 1024, file);
            strip_bom(&mut reader)?;

            loop {
                if self.cancellation.is_cancelled() {
                    cancelled = true;
                    break 'inputs;
                }
                raw_line.clear();
                let bytes_read = reader.read_until(b'\n', &mut raw_line)
                    .with_context(|| format!("read input: {}", in_path.display()))
                    .map_err(SortError::IoFailure)?;
                if bytes_read == 0 {
                    break;
                }
                consumed += bytes_read as u64;
                match std::str::from_utf8(trim_newline(&raw_line)) {
                    Ok(line) => {
                        if let Some(record) = try_parse(line) {
                            current.push(record);
                        } else {
                            self.rejected.fetch_add(1, Ordering::Relaxed);
                            log::trace!("rejected malformed line in {}", in_path.display());
                        }
                    }
                    Err(_) => {
                        self.rejected.fetch_add(1, Ordering::Relaxed);
                        log::trace!("rejected non-UTF-8 line in {}", in_path.display());
                    }
                }

                if consumed >= budget && !current.is_empty() {
                    if self.cancellation.is_cancelled() {
                        cancelled = true;
                        break 'inputs;
                    }
                    let batch = std::mem::replace(&mut current, Vec::with_capacity(current.len()));
                    self.submit_batch(&mut pool, batch, &runs);
                    consumed = 0;
                }
            }
        }

        if !cancelled && !current.is_empty() {
            self.submit_batch(&mut pool, current, &runs);
        }

        pool.shutdown();
        pool.join().map_err(|e| SortError::Fatal(anyhow!("join run-builder pool: {e}")))?;

        if cancelled {
            return Err(SortError::Cancelled);
        }

        let result = std::mem::take(
            &mut *runs.lock().map_err(|_| SortError::Fatal(anyhow!("run accumulator mutex poisoned")))?,
        );
        Ok(result)
    }

    fn submit_batch(&self, pool: &mut ThreadPool, batch: Vec<Record>, runs: &Arc<Mutex<Vec<PathBuf>>>) {
        let command = Box::new(SortAndSpillCommand::new(batch, self.temp_space.clone(), runs.clone()));
        pool.submit(command);
    }
}

/// Strip a trailing LF and, if present, the CRLF's CR as well.
fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n")
        .map(|rest| rest.strip_suffix(b"\r").unwrap_or(rest))
        .unwrap_or(line)
}

fn strip_bom(reader: &mut BufReader<File>) -> Result<(), SortError> {
    const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
    let buf = reader.fill_buf()
        .context("peek for BOM")
        .map_err(SortError::IoFailure)?;
    if buf.starts_with(&BOM) {
        reader.consume(3);
    }
    Ok(())
}

struct SortAndSpillCommand {
    batch: Mutex<Option<Vec<Record>>>,
    temp_space: Arc<TempSpace>,
    runs: Arc<Mutex<Vec<PathBuf>>>,
}

impl SortAndSpillCommand {
    fn new(batch: Vec<Record>, temp_space: Arc<TempSpace>, runs: Arc<Mutex<Vec<PathBuf>>>) -> SortAndSpillCommand {
        SortAndSpillCommand {
            batch: Mutex::new(Some(batch)),
            temp_space,
            runs,
        }
    }
}

impl Command for SortAndSpillCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        let mut batch = self.batch.lock().unwrap().take().ok_or_else(|| anyhow!("batch already taken"))?;
        batch.sort_unstable();

        let (file, path) = self.temp_space.new_run_file()?;
        {
            let mut writer = BufWriter::with_capacity(1024 * 1024, &file);
            for record in &batch {
                writer.write_all(record.to_line().as_bytes())?;
            }
            writer.flush()?;
        }
        file.sync_all().with_context(|| format!("fsync run file: {}", path.display()))?;

        self.runs.lock().unwrap().push(path);
        Ok(())
    }
}
