use std::cmp::max;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use rlimit::{getrlimit, setrlimit, Resource};

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::error::{SortError, SortOutcome};
use crate::merger::Merger;
use crate::run_builder::RunBuilder;
use crate::temp_space::TempSpace;

/// External merge sort of a `<integer>. <text>` record file.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use record_file_sort::sort::Sort;
///
/// fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut sort = Sort::new(vec![input], output);
///
///     // set how many writer threads phase 1 uses. The default is half the
///     // available CPU cores.
///     sort.with_threads(2);
///
///     // set the directory for intermediate run files. The default is the
///     // system temp dir - std::env::temp_dir() - however for large files it
///     // is recommended to use a dedicated directory on the same file system
///     // as the output.
///     sort.with_tmp_dir(tmp);
///
///     sort.sort()?;
///     Ok(())
/// }
/// ```
pub struct Sort {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    tmp: PathBuf,
    threads: usize,
    mem_mb: u64,
    run_size_bytes: Option<u64>,
    fan_in: usize,
    cancellation: CancellationToken,
    rejected: Arc<AtomicU64>,
}

impl Sort {
    /// Create a default sort definition.
    ///
    /// `inputs` is read as a single logical stream, file after file, for
    /// [Sort::sort]; the same paths are treated as already-sorted runs to be
    /// k-way merged directly for [Sort::merge].
    ///
    /// * intermediate files are written under `std::env::temp_dir()`
    /// * `threads` defaults to `max(1, num_cpus::get() / 2)`
    /// * `mem_mb` (and therefore `run_size_mb`) defaults to 1024
    /// * `fan_in` defaults to 128
    ///
    /// The rlimit NOFILE soft limit is raised for the duration of the sort
    /// to accommodate the configured fan-in, then restored.
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> Sort {
        Sort {
            inputs,
            output,
            tmp: std::env::temp_dir(),
            threads: 0,
            mem_mb: 1024,
            run_size_bytes: None,
            fan_in: 128,
            cancellation: CancellationToken::new(),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set the directory for intermediate run files. Default: `std::env::temp_dir()`.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) -> &mut Sort {
        self.tmp = tmp;
        self
    }

    /// Set the number of phase-1 writer threads. `0` (the default) uses
    /// `max(1, num_cpus::get() / 2)`.
    pub fn with_threads(&mut self, threads: usize) -> &mut Sort {
        self.threads = threads;
        self
    }

    /// Set the coarse memory budget in MiB. Drives the default run-size
    /// budget when `with_run_size_mb` is not also called.
    pub fn with_mem_mb(&mut self, mem_mb: u64) -> &mut Sort {
        self.mem_mb = mem_mb;
        self
    }

    /// Set the per-run input-byte budget in MiB directly, overriding the
    /// `mem_mb`-derived default.
    pub fn with_run_size_mb(&mut self, run_size_mb: u64) -> &mut Sort {
        self.run_size_bytes = Some(run_size_mb * 1024 * 1024);
        self
    }

    /// Set the per-run input-byte budget directly, in bytes. Overrides the
    /// `mem_mb`-derived default. Useful for tests that need to force small
    /// runs without generating megabytes of input.
    pub fn with_run_size_bytes(&mut self, run_size_bytes: u64) -> &mut Sort {
        self.run_size_bytes = Some(run_size_bytes);
        self
    }

    /// Set the maximum number of runs merged together in one pass. Must be
    /// at least 2; values below 2 are raised to 2.
    pub fn with_fan_in(&mut self, fan_in: usize) -> &mut Sort {
        self.fan_in = fan_in;
        self
    }

    /// A handle that can be used to cancel an in-progress `sort()`/`merge()`
    /// from another thread. Cancellation is cooperative: loops observe it at
    /// line and queue-operation granularity.
    pub fn cancellation_handle(&self) -> impl Fn() + Send + Sync + 'static {
        let token = self.cancellation.clone();
        move || token.cancel()
    }

    /// Number of input lines silently rejected by the parser across the most
    /// recent `sort()`/`merge()` call.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn create_config(&self) -> Config {
        let threads = if self.threads == 0 {
            max(1, num_cpus::get() / 2)
        } else {
            self.threads
        };
        let run_size_bytes = self.run_size_bytes.unwrap_or(self.mem_mb * 1024 * 1024);
        Config::new(self.tmp.clone(), run_size_bytes, threads, self.fan_in)
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {soft}, hard: {hard}"))?;
        Ok(())
    }

    /// Run both phases: partition `inputs` into sorted runs, then merge those
    /// runs into `output`.
    pub fn sort(&self) -> Result<SortOutcome, SortError> {
        let config = self.create_config();
        self.rejected.store(0, Ordering::Relaxed);
        self.with_raised_rlimit(&config, || {
            let temp_space = Arc::new(TempSpace::new(config.tmp())?);
            let run_builder = RunBuilder::new(&config, temp_space.clone(), self.cancellation.clone(), self.rejected.clone());
            let runs = run_builder.build(&self.inputs)?;

            let merger = Merger::new(&config, &temp_space, self.cancellation.clone());
            merger.merge(runs, &self.output)?;
            Ok(SortOutcome::Ok)
        })
    }

    /// Run phase 2 alone: merge a set of already internally-sorted input
    /// files directly into `output`. `inputs` (as given to [Sort::new]) are
    /// taken as already-sorted runs to be merged directly, with no phase-1
    /// partition-and-spill pass.
    pub fn merge(&self) -> Result<SortOutcome, SortError> {
        let config = self.create_config();
        self.with_raised_rlimit(&config, || {
            let temp_space = TempSpace::new(config.tmp())?;
            let merger = Merger::new(&config, &temp_space, self.cancellation.clone());
            merger.merge(self.inputs.clone(), &self.output)?;
            Ok(SortOutcome::Ok)
        })
    }

    fn with_raised_rlimit<F>(&self, config: &Config, body: F) -> Result<SortOutcome, SortError>
    where
        F: FnOnce() -> Result<SortOutcome, SortError>,
    {
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("current rlimit NOFILE, soft: {current_soft}, hard: {current_hard}");
        let new_soft = max((config.fan_in() + 256) as u64, current_soft);
        log::info!("raising rlimit NOFILE, soft: {new_soft}, hard: {current_hard}");
        Self::set_rlimits(new_soft, current_hard)?;

        let result = body();

        log::info!("restoring rlimit NOFILE, soft: {current_soft}, hard: {current_hard}");
        Self::set_rlimits(current_soft, current_hard)?;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(SortError::Cancelled) => Ok(SortOutcome::Cancelled),
            Err(e) => Err(e),
        }
    }
}
