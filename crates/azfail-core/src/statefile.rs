//! Durable state-file codec: one JSON document per fail/recover pair.
//!
//! The document is built entirely in memory during `fail_az` and flushed
//! once; `recover_az` reads it once and deletes it on success. The file is
//! the only persisted state, guarded by an exclusive advisory lock held for
//! the duration of either call.

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{AzError, AzResult};
use crate::service::Service;

/// Minimal probe of an existing document, used to decide whether it may be
/// overwritten.
#[derive(Deserialize)]
struct DocumentHeader {
    #[serde(rename = "DryRun")]
    dry_run: bool,
}

fn suffix(path: &Path, service: Service) -> PathBuf {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{}.json", service.file_token()));
        let normalized = PathBuf::from(name);
        tracing::warn!(
            service = %service,
            path = %normalized.display(),
            "File extension .json not provided in path, appended service suffix"
        );
        normalized
    }
}

/// Resolves the path every other codec function operates on: rejects
/// directories and appends `.{service}.json` when the `.json` extension is
/// missing. The service token keeps two services from clobbering each
/// other's state when the operator reuses a base path.
pub fn normalize_path(path: &Path, service: Service) -> AzResult<PathBuf> {
    if path.is_dir() {
        return Err(AzError::state_file(
            service,
            format!(
                "path provided is a directory, please provide a file name ({})",
                path.display()
            ),
        ));
    }
    Ok(suffix(path, service))
}

/// Pre-flight for a new `fail_az`, run on a normalized path while the lock
/// is held: the path must not point at an existing non-dry-run document (a
/// prior real failure not yet rolled back). A leftover dry-run document is
/// silently overwritten.
pub fn validate_for_write(path: &Path, service: Service) -> AzResult<()> {
    if path.is_file() {
        let existing: DocumentHeader = read(path, service)?;
        if !existing.dry_run {
            return Err(AzError::state_file(
                service,
                format!(
                    "existing state file found, check the file, back it up if needed, \
                     then delete it to run this activity ({})",
                    path.display()
                ),
            ));
        }
        tracing::warn!(
            service = %service,
            path = %path.display(),
            "Overwriting state file left behind by a dry run"
        );
    }
    Ok(())
}

/// Pre-flight for `recover_az`, run on a normalized path while the lock is
/// held: the document must exist.
pub fn validate_for_read(path: &Path, service: Service) -> AzResult<()> {
    if !path.is_file() {
        return Err(AzError::state_file(
            service,
            format!(
                "to rollback AZ failure, you must specify the path to the file \
                 generated from fail_az ({})",
                path.display()
            ),
        ));
    }
    Ok(())
}

/// Whole-document overwrite, written exactly once per fail_az call.
pub fn write<T: Serialize>(document: &T, path: &Path, service: Service) -> AzResult<()> {
    let json = serde_json::to_string(document)
        .map_err(|e| AzError::state_file(service, format!("serializing state: {e}")))?;
    std::fs::write(path, json).map_err(|e| {
        AzError::state_file(service, format!("writing state to {}: {e}", path.display()))
    })
}

pub fn read<T: DeserializeOwned>(path: &Path, service: Service) -> AzResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AzError::state_file(service, format!("reading state from {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        AzError::state_file(service, format!("invalid state file {}: {e}", path.display()))
    })
}

/// Deletes the document after a successful rollback. Best-effort: the
/// mutations already succeeded, so a failed delete only logs.
pub fn remove_best_effort(path: &Path, service: Service) {
    tracing::warn!(
        service = %service,
        path = %path.display(),
        "Completed rollback, removing state file from disk"
    );
    if let Err(e) = std::fs::remove_file(path) {
        tracing::error!(
            service = %service,
            path = %path.display(),
            error = %e,
            "Error removing state file"
        );
    }
}

/// Exclusive advisory lock on a sibling `.lock` file, held for the duration
/// of a fail or recover call. Two concurrent invocations against the same
/// path would otherwise both pass the existence pre-flight before either
/// writes.
#[derive(Debug)]
pub struct Lock {
    file: File,
}

impl Lock {
    pub fn acquire(state_path: &Path, service: Service) -> AzResult<Self> {
        let mut name = state_path.as_os_str().to_os_string();
        name.push(".lock");
        let lock_path = PathBuf::from(name);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                AzError::state_file(
                    service,
                    format!("opening lock file {}: {e}", lock_path.display()),
                )
            })?;
        file.try_lock_exclusive().map_err(|_| {
            AzError::state_file(
                service,
                format!(
                    "another fail_az/recover_az is running against {}",
                    state_path.display()
                ),
            )
        })?;
        Ok(Self { file })
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_service_suffix_when_extension_missing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("fail_az");
        let path = normalize_path(&base, Service::Asg).unwrap();
        assert!(path.to_string_lossy().ends_with("fail_az.asg.json"));
    }

    #[test]
    fn keeps_explicit_json_extension() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("custom.json");
        let path = normalize_path(&base, Service::Ec2).unwrap();
        assert_eq!(path, base);
    }

    #[test]
    fn rejects_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize_path(dir.path(), Service::Ec2).unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn rejects_existing_non_dry_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail_az.asg.json");
        std::fs::write(&path, json!({"DryRun": false}).to_string()).unwrap();
        assert!(validate_for_write(&path, Service::Asg).is_err());
    }

    #[test]
    fn overwrites_existing_dry_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail_az.asg.json");
        std::fs::write(&path, json!({"DryRun": true}).to_string()).unwrap();
        assert!(validate_for_write(&path, Service::Asg).is_ok());
    }

    #[test]
    fn recover_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = normalize_path(&dir.path().join("missing"), Service::Elb).unwrap();
        let err = validate_for_read(&path, Service::Elb).unwrap_err();
        assert!(err.to_string().contains("fail_az"));
    }

    #[test]
    fn lock_is_exclusive_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail_az.rds.json");
        let held = Lock::acquire(&path, Service::Rds).unwrap();
        assert!(Lock::acquire(&path, Service::Rds).is_err());
        drop(held);
        assert!(Lock::acquire(&path, Service::Rds).is_ok());
    }
}
