use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use data_encoding::HEXLOWER;

#[allow(dead_code)]
pub fn scratch_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("record-file-sort-tests");
    dir.push(HEXLOWER.encode(&rand::random::<[u8; 16]>()));
    fs::create_dir_all(&dir).unwrap_or_else(|_| panic!("failed to create scratch dir: {dir:?}"));
    dir
}

#[allow(dead_code)]
pub fn write_lines(dir: &PathBuf, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap_or_else(|_| panic!("failed to create {path:?}"));
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

#[allow(dead_code)]
pub fn read_lines(path: &PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}
