use std::path::Path;
use taskprobe_client::dfs::LocalDfs;
use taskprobe_client::inputs::{prepare_text_input, INPUT_CORPUS};
use taskprobe_client::Dfs;
use tempfile::tempdir;

#[test]
fn test_prepare_text_input_replaces_previous_run() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());

    let stale_output = root.path().join("out/part-00000");
    std::fs::create_dir_all(stale_output.parent().unwrap()).unwrap();
    std::fs::write(&stale_output, "old").unwrap();
    std::fs::create_dir_all(root.path().join("in")).unwrap();
    std::fs::write(root.path().join("in/leftover.txt"), "old").unwrap();

    prepare_text_input(&dfs, Path::new("/in"), Path::new("/out"), 3).unwrap();

    assert!(!root.path().join("out").exists());
    assert!(!root.path().join("in/leftover.txt").exists());
    let data = std::fs::read_to_string(root.path().join("in/data.txt")).unwrap();
    assert_eq!(data, INPUT_CORPUS.repeat(3));
}

#[cfg(unix)]
#[test]
fn test_input_directory_is_world_writable() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    prepare_text_input(&dfs, Path::new("in"), Path::new("out"), 1).unwrap();

    let mode = std::fs::metadata(root.path().join("in"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o777);
}

#[test]
fn test_stale_input_file_is_replaced_by_a_directory() {
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("in"), "not a dir").unwrap();
    let dfs = LocalDfs::new(root.path());

    // The stale file is removed first, so the directory can be created.
    prepare_text_input(&dfs, Path::new("in"), Path::new("out"), 1).unwrap();
    assert!(root.path().join("in").is_dir());

    assert!(dfs.delete(Path::new("in"), true).unwrap());
    assert!(!dfs.delete(Path::new("in"), true).unwrap());
}
