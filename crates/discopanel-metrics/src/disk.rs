//! Disk sampling (§4.6): the world directory's total size and the data
//! volume's free space.

use std::path::Path;

/// Recursively sums the size of every regular file under `dir`. Missing
/// directories (a world that hasn't generated yet) yield `0` rather than an
/// error.
pub async fn world_size_bytes(dir: &Path) -> u64 {
    walk(dir).await
}

async fn walk(dir: &Path) -> u64 {
    let mut total = 0u64;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut subdirs = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() {
            if let Ok(meta) = entry.metadata().await {
                total += meta.len();
            }
        }
    }

    for subdir in subdirs {
        total += Box::pin(walk(&subdir)).await;
    }

    total
}

/// Free bytes available to an unprivileged writer on the filesystem backing
/// `path`, via `statvfs(2)`. Returns `None` on any platform/query failure
/// rather than propagating, since this is a best-effort sample.
pub fn free_space_bytes(path: &Path) -> Option<u64> {
    platform::free_space_bytes(path)
}

#[cfg(unix)]
mod platform {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub fn free_space_bytes(path: &Path) -> Option<u64> {
        let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
        let mut stat = MaybeUninit::<libc::statvfs>::uninit();
        // SAFETY: `c_path` is a valid NUL-terminated C string for the
        // duration of the call, and `stat` is written fully by statvfs on
        // success before being assumed init.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        let stat = unsafe { stat.assume_init() };
        Some(stat.f_bavail as u64 * stat.f_frsize as u64)
    }
}

#[cfg(not(unix))]
mod platform {
    use std::path::Path;

    pub fn free_space_bytes(_path: &Path) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sums_nested_file_sizes() {
        let dir = tempdir();
        tokio::fs::write(dir.join("a.txt"), b"hello").await.unwrap();
        tokio::fs::create_dir(dir.join("sub")).await.unwrap();
        tokio::fs::write(dir.join("sub/b.txt"), b"world!").await.unwrap();

        assert_eq!(world_size_bytes(&dir).await, 11);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_reports_zero() {
        assert_eq!(world_size_bytes(Path::new("/nonexistent/discopanel-test-dir")).await, 0);
    }

    #[test]
    fn free_space_of_root_is_nonzero() {
        assert!(free_space_bytes(Path::new("/")).unwrap_or(0) > 0 || cfg!(not(unix)));
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("discopanel-metrics-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
