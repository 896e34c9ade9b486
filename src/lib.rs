//! External merge sort for text files composed of `<integer>. <text>`
//! records.
//!
//! The sort key is the `text` part, compared byte-wise (ordinal, not
//! locale-aware); ties are broken by the `<integer>` ascending. Input lines
//! that do not match the record grammar are silently dropped.
//!
//! The engine streams arbitrarily large inputs through two phases: a
//! bounded-memory partition-and-spill pass that produces internally sorted
//! run files, followed by a fan-in-bounded (possibly multi-pass) k-way
//! merge of those runs into the destination file.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//! use record_file_sort::sort::Sort;
//!
//! fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut sort = Sort::new(vec![input], output);
//!
//!     // set how many writer threads phase 1 uses. The default is half the
//!     // available CPU cores.
//!     sort.with_threads(2);
//!
//!     // set the directory for intermediate run files. The default is the
//!     // system temp dir - std::env::temp_dir() - however for large files it
//!     // is recommended to use a dedicated directory on the same file
//!     // system as the output.
//!     sort.with_tmp_dir(tmp);
//!
//!     sort.sort()?;
//!     Ok(())
//! }
//! ```

pub(crate) mod cancellation;
pub(crate) mod config;
pub(crate) mod merger;
pub(crate) mod record;
pub(crate) mod run_builder;
pub(crate) mod temp_space;

pub mod error;
pub mod sort;
