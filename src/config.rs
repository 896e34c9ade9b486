use std::path::PathBuf;

/// Internal, fully-resolved configuration translated from the public
/// [crate::sort::Sort] builder.
#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    run_size_bytes: u64,
    threads: usize,
    fan_in: usize,
}

impl Config {
    pub(crate) fn new(tmp: PathBuf, run_size_bytes: u64, threads: usize, fan_in: usize) -> Config {
        Config {
            tmp,
            run_size_bytes,
            threads: threads.max(1),
            fan_in: fan_in.max(2),
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn run_size_bytes(&self) -> u64 {
        self.run_size_bytes
    }

    pub(crate) fn threads(&self) -> usize {
        self.threads
    }

    pub(crate) fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.threads.max(1)
    }
}
