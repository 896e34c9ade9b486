use std::path::{Path, PathBuf};

use anyhow::Error;
use simple_logger::SimpleLogger;

use record_file_sort::sort::Sort;

fn sort_small_file(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut sort = Sort::new(vec![input_path.to_path_buf()], output_path.to_path_buf());
    sort.sort()?;
    Ok(())
}

fn sort_with_small_runs_and_fan_in(input_path: &Path, output_path: &Path, tmp_dir: &Path) -> Result<(), Error> {
    let mut sort = Sort::new(vec![input_path.to_path_buf()], output_path.to_path_buf());
    sort.with_tmp_dir(tmp_dir.to_path_buf());
    sort.with_run_size_mb(64);
    sort.with_fan_in(32);
    sort.with_threads(4);
    sort.sort()?;
    Ok(())
}

fn merge_presorted_runs(presorted_paths: Vec<PathBuf>, output_path: &Path) -> Result<(), Error> {
    let mut sort = Sort::new(presorted_paths, output_path.to_path_buf());
    sort.merge()?;
    Ok(())
}

// cargo run --example sort_record_file
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started sort_record_file demo.");

    let input_path = PathBuf::from("./target/demo-input.dat");
    let output_path = PathBuf::from("./target/demo-output.dat");
    let tmp_path = PathBuf::from("./target/demo-tmp");

    std::fs::write(
        &input_path,
        "2. Apple\n1. Banana\n3. Apple\n5. Apple is tasty\n4. Apple\n2. Banana\n",
    )?;

    sort_small_file(&input_path, &output_path)?;
    sort_with_small_runs_and_fan_in(&input_path, &output_path, &tmp_path)?;
    merge_presorted_runs(vec![output_path.clone()], &PathBuf::from("./target/demo-remerged.dat"))?;

    log::info!("Finished sort_record_file demo.");
    Ok(())
}
