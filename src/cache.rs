//! Filesystem-backed download cache
//!
//! There is no index: a non-empty file at a request's destination *is* the cache
//! entry. Lookups happen once, before dispatch, and are not repeated mid-batch.
//! Stores go through a uniquely named hidden sibling and a rename so an
//! interrupted or failed write never leaves a half-written file that a later
//! lookup would accept.

use crate::error::ItemError;
use rand::Rng;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Size of the cached file at `path`, or `None` on a miss
///
/// Missing paths, directories, empty files and unreadable metadata are all misses.
pub async fn cached_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        Ok(_) => None,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Treating unreadable destination as a cache miss");
            }
            None
        }
    }
}

/// Create the parent directory of every destination
///
/// Each distinct directory is created once. Fails on the first directory that
/// cannot be created.
pub async fn ensure_parent_dirs(paths: &[&Path]) -> std::io::Result<()> {
    let mut created: Vec<&Path> = Vec::new();

    for path in paths.iter().copied() {
        let Some(parent) = path.parent() else {
            continue;
        };
        if parent.as_os_str().is_empty() || created.contains(&parent) {
            continue;
        }
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to create directory '{}': {}", parent.display(), e),
            )
        })?;
        created.push(parent);
    }

    Ok(())
}

/// Write `bytes` to `path` through a temporary sibling
///
/// The temporary file gets a fresh random name and is opened with
/// `create_new`, so no existing file other than `path` is ever touched.
/// Returns the number of bytes written. On error no file is left at `path`
/// and the temporary file is removed.
pub async fn store(path: &Path, bytes: &[u8]) -> std::result::Result<u64, ItemError> {
    let write_error = |source| ItemError::Write {
        path: path.to_path_buf(),
        source,
    };
    let (part, mut file) = create_part_file(path).await.map_err(write_error)?;

    let result = async {
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part, path).await
    }
    .await;

    match result {
        Ok(()) => Ok(bytes.len() as u64),
        Err(source) => {
            if let Err(e) = tokio::fs::remove_file(&part).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %part.display(), error = %e, "Failed to remove partial file");
            }
            Err(write_error(source))
        }
    }
}

/// Attempts at finding an unused temporary name before giving up
const PART_NAME_ATTEMPTS: usize = 8;

async fn create_part_file(path: &Path) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    let mut last_err = None;
    for _ in 0..PART_NAME_ATTEMPTS {
        let part = part_path(path, rand::thread_rng().r#gen());
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part)
            .await
        {
            Ok(file) => return Ok((part, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("no temporary name available")))
}

/// Hidden sibling `.<name>.<tag>.part`
fn part_path(path: &Path, tag: u64) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(
        path.file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("download")),
    );
    name.push(format!(".{tag:016x}.part"));
    path.with_file_name(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_and_empty_files_are_misses() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.jpg");
        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();

        assert_eq!(cached_size(&missing).await, None);
        assert_eq!(cached_size(&empty).await, None);
        assert_eq!(cached_size(dir.path()).await, None, "directories are never hits");
    }

    #[tokio::test]
    async fn non_empty_file_is_a_hit_with_its_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lion.jpg");
        std::fs::write(&path, b"12345").unwrap();

        assert_eq!(cached_size(&path).await, Some(5));
    }

    #[tokio::test]
    async fn ensure_parent_dirs_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("wikipedia_animals/lion.jpg");
        let b = dir.path().join("wikipedia_animals/owl.jpg");
        let c = dir.path().join("deep/er/still/cat.jpg");

        ensure_parent_dirs(&[a.as_path(), b.as_path(), c.as_path()])
            .await
            .unwrap();

        assert!(dir.path().join("wikipedia_animals").is_dir());
        assert!(dir.path().join("deep/er/still").is_dir());
    }

    #[tokio::test]
    async fn ensure_parent_dirs_fails_when_a_file_blocks_the_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let dest = blocker.join("child/lion.jpg");

        assert!(ensure_parent_dirs(&[dest.as_path()]).await.is_err());
    }

    #[tokio::test]
    async fn store_writes_bytes_and_leaves_no_part_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("owl.png");

        let written = store(&path, b"png-bytes").await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, [std::ffi::OsString::from("owl.png")]);
    }

    #[tokio::test]
    async fn store_never_touches_a_file_named_like_the_old_part_scheme() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        let neighbour = dir.path().join("a.png.part");
        std::fs::write(&neighbour, b"CACHED-USER-DATA").unwrap();

        store(&path, b"png-bytes").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
        assert_eq!(std::fs::read(&neighbour).unwrap(), b"CACHED-USER-DATA");
    }

    #[tokio::test]
    async fn store_replaces_an_existing_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"old").unwrap();

        store(&path, b"new-bytes").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new-bytes");
    }

    #[tokio::test]
    async fn store_failure_reports_destination_and_creates_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-such-dir/owl.png");

        let err = store(&path, b"bytes").await.unwrap_err();

        match err {
            ItemError::Write { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected write error, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn part_path_is_a_hidden_sibling() {
        assert_eq!(
            part_path(Path::new("/tmp/a/lion.jpg"), 0xbeef),
            PathBuf::from("/tmp/a/.lion.jpg.000000000000beef.part")
        );
        assert_ne!(
            part_path(Path::new("lion.jpg"), 1),
            part_path(Path::new("lion.jpg"), 2)
        );
    }
}
