use std::fs;

use record_file_sort::sort::Sort;

mod common;

#[test]
fn merge_only_combines_presorted_files() -> Result<(), anyhow::Error> {
    let dir = common::scratch_dir();
    // Sort::merge() treats its single `input` path as the sole already-sorted
    // run; build one by running a full sort first.
    let unsorted = common::write_lines(&dir, "unsorted.dat", &["3. a", "1. a", "2. a"]);
    let presorted = dir.join("presorted.dat");
    let mut build = Sort::new(vec![unsorted], presorted.clone());
    build.with_tmp_dir(dir.clone());
    build.sort().map_err(|e| anyhow::anyhow!("{e}"))?;

    let merged = dir.join("merged.dat");
    let mut merge_only = Sort::new(vec![presorted], merged.clone());
    merge_only.with_tmp_dir(dir.clone());
    merge_only.merge().map_err(|e| anyhow::anyhow!("{e}"))?;

    let lines = common::read_lines(&merged)?;
    assert_eq!(lines, vec!["1. a", "2. a", "3. a"]);
    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn merge_k_way_merges_multiple_presorted_runs() -> Result<(), anyhow::Error> {
    let dir = common::scratch_dir();
    let run_a = common::write_lines(&dir, "run-a.dat", &["2. Apple", "3. Apple", "1. Banana"]);
    let run_b = common::write_lines(&dir, "run-b.dat", &["4. Apple", "5. Apple is tasty", "2. Banana"]);
    let merged = dir.join("merged.dat");

    let mut merge_only = Sort::new(vec![run_a, run_b], merged.clone());
    merge_only.with_tmp_dir(dir.clone());
    merge_only.merge().map_err(|e| anyhow::anyhow!("{e}"))?;

    let lines = common::read_lines(&merged)?;
    assert_eq!(
        lines,
        vec!["2. Apple", "3. Apple", "4. Apple", "5. Apple is tasty", "1. Banana", "2. Banana"]
    );
    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn merge_fan_in_forces_multi_pass_over_many_presorted_runs() -> Result<(), anyhow::Error> {
    let dir = common::scratch_dir();
    let mut run_paths = Vec::new();
    for i in 0..20 {
        let lines: Vec<String> = (0..10).map(|j| format!("{j}. r{i:02}-{j}")).collect();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        run_paths.push(common::write_lines(&dir, &format!("run-{i}.dat"), &refs));
    }
    let merged = dir.join("merged.dat");

    let mut merge_only = Sort::new(run_paths, merged.clone());
    merge_only.with_tmp_dir(dir.clone());
    merge_only.with_fan_in(3);
    merge_only.merge().map_err(|e| anyhow::anyhow!("{e}"))?;

    let lines = common::read_lines(&merged)?;
    assert_eq!(lines.len(), 200);
    for pair in lines.windows(2) {
        assert!(pair[0] <= pair[1], "output must be totally ordered: {:?}", pair);
    }
    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn temp_space_is_cleaned_up_after_a_successful_sort() -> Result<(), anyhow::Error> {
    let dir = common::scratch_dir();
    let input = common::write_lines(&dir, "in.dat", &["2. b", "1. a"]);
    let output = dir.join("out.dat");
    let tmp_root = dir.join("tmp-root");

    let mut sort = Sort::new(vec![input], output);
    sort.with_tmp_dir(tmp_root.clone());
    sort.sort().map_err(|e| anyhow::anyhow!("{e}"))?;

    let leftover: Vec<_> = fs::read_dir(&tmp_root)?.collect::<Result<Vec<_>, _>>()?;
    assert!(leftover.is_empty(), "expected no residual engine temp entries, found {leftover:?}");
    fs::remove_dir_all(&dir)?;
    Ok(())
}
