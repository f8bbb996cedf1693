use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `v_bytes` to `path_file_dst` via a sibling temp file and rename.
///
/// Readers never observe a half-written file: on any failure the temp file
/// is removed and `path_file_dst` is left untouched.
pub fn write_file_atomic(path_file_dst: &Path, v_bytes: &[u8]) -> Result<(), io::Error> {
    let path_dir_parent = derive_parent_dir(path_file_dst);
    let mut file_tmp = NamedTempFile::new_in(path_dir_parent)?;
    file_tmp.write_all(v_bytes)?;
    file_tmp.as_file().sync_all()?;
    file_tmp.persist(path_file_dst).map_err(|e| e.error)?;
    Ok(())
}

/// Remove `path_file` if present; missing files are not an error.
pub fn remove_file_if_exists(path_file: &Path) -> Result<(), io::Error> {
    match fs::remove_file(path_file) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub(crate) fn derive_parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Resolve worker count: explicit values clamp to `[1, cpus]`, default is
/// `min(cpus, 8)`.
pub fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_atomic_writes_and_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file = tmp.path().join("out.bin");

        write_file_atomic(&path_file, b"first").unwrap();
        write_file_atomic(&path_file, b"second").unwrap();
        assert_eq!(fs::read(&path_file).unwrap(), b"second");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_file_atomic_fails_cleanly_for_missing_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file = tmp.path().join("missing").join("out.bin");

        assert!(write_file_atomic(&path_file, b"x").is_err());
        assert!(!path_file.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn remove_file_if_exists_ignores_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let path_file = tmp.path().join("gone.txt");
        remove_file_if_exists(&path_file).unwrap();
        fs::write(&path_file, "x").unwrap();
        remove_file_if_exists(&path_file).unwrap();
        assert!(!path_file.exists());
    }

    #[test]
    fn calculate_worker_limit_clamps() {
        let n_cpu = std::thread::available_parallelism()
            .map(|v| v.get())
            .unwrap_or(1);
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert_eq!(calculate_worker_limit(Some(usize::MAX)), n_cpu);
        assert_eq!(calculate_worker_limit(None), n_cpu.clamp(1, 8));
    }
}
