use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::error::DownloadError;

/// How many times a failed download is attempted again before giving up.
pub const DOWNLOAD_RETRIES: usize = 1;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams `url` into `dest`, creating parent directories as needed.
///
/// Bytes are written to a sibling `.part` file that is renamed over `dest`
/// only once the body has been read in full, so an interrupted transfer
/// never leaves a truncated file at `dest`.
pub fn download_to_file(url: &str, dest: &Path, timeout: Duration) -> Result<u64, DownloadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| DownloadError::Http {
            url: url.to_string(),
            source,
        })?;

    let mut attempt = 0;
    loop {
        match fetch_once(&client, url, dest) {
            Ok(bytes) => {
                info!("downloaded {} bytes from {} to {}", bytes, url, dest.display());
                return Ok(bytes);
            }
            Err(e) if attempt < DOWNLOAD_RETRIES => {
                attempt += 1;
                warn!("download of {} failed ({}), retrying", url, e);
            }
            Err(e) => return Err(e),
        }
    }
}

fn fetch_once(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let http_err = |source| DownloadError::Http {
        url: url.to_string(),
        source,
    };

    let mut response = client.get(url).send().map_err(http_err)?;
    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let part = part_path(dest);

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut file = File::create(&part).map_err(io_err(&part))?;
    let written = match response.copy_to(&mut file) {
        Ok(n) => n,
        Err(source) => {
            drop(file);
            let _ = fs::remove_file(&part);
            return Err(http_err(source));
        }
    };
    commit_part(file, &part, dest)?;
    Ok(written)
}

/// Flushes the finished `.part` file and moves it over `dest`. The `.part`
/// file is removed if either step fails.
fn commit_part(file: File, part: &Path, dest: &Path) -> Result<(), DownloadError> {
    let result = file
        .sync_all()
        .map_err(io_err(part))
        .and_then(|()| {
            drop(file);
            fs::rename(part, dest).map_err(io_err(dest))
        });
    if result.is_err() {
        let _ = fs::remove_file(part);
    }
    result
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DownloadError {
    let path = path.to_path_buf();
    move |source| DownloadError::Io { path, source }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Downloads `url` into `path` unless the file already exists.
///
/// Returns whether a download took place.
pub fn ensure_local_copy(path: &Path, url: &str, timeout: Duration) -> Result<bool, DownloadError> {
    match path.try_exists() {
        Ok(true) => Ok(false),
        Ok(false) => {
            info!("{} not found locally, fetching {}", path.display(), url);
            download_to_file(url, path, timeout).map(|_| true)
        }
        Err(source) => Err(io_err(path)(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_file_sits_next_to_destination() {
        assert_eq!(
            part_path(Path::new("models/model.bin")),
            PathBuf::from("models/model.bin.part")
        );
    }

    #[test]
    fn failed_rename_removes_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("model.bin.part");
        // A non-empty directory cannot be replaced by a file.
        let dest = dir.path().join("model.bin");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"x").unwrap();
        fs::write(&part, b"payload").unwrap();

        let file = File::open(&part).unwrap();
        let err = commit_part(file, &part, &dest).unwrap_err();
        assert!(matches!(err, DownloadError::Io { .. }));
        assert!(!part.exists());
        assert!(dest.is_dir());
    }

    #[test]
    fn committed_part_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("data.csv.part");
        let dest = dir.path().join("data.csv");
        fs::write(&dest, b"old").unwrap();
        fs::write(&part, b"new").unwrap();

        commit_part(File::open(&part).unwrap(), &part, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!part.exists());
    }

    #[test]
    fn existing_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.bin");
        fs::write(&path, b"already here").unwrap();

        // Port 1 refuses connections, so any network attempt would fail.
        let fetched =
            ensure_local_copy(&path, "http://127.0.0.1:1/present.bin", Duration::from_secs(1))
                .unwrap();
        assert!(!fetched);
        assert_eq!(fs::read(&path).unwrap(), b"already here");
    }

    #[test]
    fn unreachable_url_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = download_to_file("http://127.0.0.1:1/missing.bin", &path, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, DownloadError::Http { .. }));
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }
}
