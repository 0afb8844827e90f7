//! Data file staging.
//!
//! The load script reads its data from a directory the database server can
//! see. Before loading, the data file is copied there. When the copy is
//! denied, the stager can optionally retry through `sudo`.

use crate::config::StagingConfig;
use crate::error::{LoaderError, Result};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// What to do when a plain copy is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escalation {
    /// Report the permission error.
    #[default]
    Never,
    /// Retry with `sudo cp` and `sudo chmod 644`.
    Sudo,
}

/// A data file placed where the database reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// True when the copy needed `sudo`.
    pub escalated: bool,
}

/// Places data files where the database can read them.
pub trait Stager {
    fn stage(&self, source: &Path) -> Result<StagedFile>;
}

/// Copies data files into a local directory.
#[derive(Debug, Clone)]
pub struct LocalStager {
    data_dir: PathBuf,
    target_name: String,
    escalation: Escalation,
}

impl LocalStager {
    pub fn new(data_dir: impl Into<PathBuf>, target_name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            target_name: target_name.into(),
            escalation: Escalation::Never,
        }
    }

    pub fn with_escalation(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    /// Builds a stager from the `[staging]` config table.
    pub fn from_config(config: &StagingConfig) -> Self {
        let escalation = if config.sudo_fallback {
            Escalation::Sudo
        } else {
            Escalation::Never
        };
        Self::new(&config.data_dir, &config.target_name).with_escalation(escalation)
    }

    /// Returns where staged files are written.
    pub fn target_path(&self) -> PathBuf {
        self.data_dir.join(&self.target_name)
    }

    fn copy_with_sudo(&self, source: &Path, target: &Path) -> Result<()> {
        run_sudo(&sudo_copy_args(source, target))?;
        run_sudo(&sudo_chmod_args(target))
    }
}

impl Stager for LocalStager {
    fn stage(&self, source: &Path) -> Result<StagedFile> {
        if !source.is_file() {
            return Err(LoaderError::input(format!("{} not found", source.display())));
        }

        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            LoaderError::staging(format!(
                "Cannot create data directory {}: {e}",
                self.data_dir.display()
            ))
        })?;

        let target = self.target_path();
        if is_same_file(source, &target) {
            info!("{} is already in the data directory", source.display());
            return Ok(StagedFile {
                path: target,
                escalated: false,
            });
        }
        debug!("Copying {} to {}", source.display(), target.display());

        match std::fs::copy(source, &target) {
            Ok(_) => {
                info!("Copied {} to {}", source.display(), target.display());
                Ok(StagedFile {
                    path: target,
                    escalated: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => match self.escalation {
                Escalation::Sudo => {
                    warn!("Copy denied, retrying with sudo");
                    self.copy_with_sudo(source, &target)?;
                    info!("Copied {} to {} (with sudo)", source.display(), target.display());
                    Ok(StagedFile {
                        path: target,
                        escalated: true,
                    })
                }
                Escalation::Never => Err(LoaderError::staging(format!(
                    "Permission denied copying to {}. Re-run with --sudo-fallback to copy with sudo.",
                    target.display()
                ))),
            },
            Err(e) => Err(LoaderError::staging(format!(
                "Cannot copy {} to {}: {e}",
                source.display(),
                target.display()
            ))),
        }
    }
}

/// `--` keeps paths starting with `-` from being read as options.
fn sudo_copy_args<'a>(source: &'a Path, target: &'a Path) -> [&'a OsStr; 4] {
    [
        OsStr::new("cp"),
        OsStr::new("--"),
        source.as_os_str(),
        target.as_os_str(),
    ]
}

fn sudo_chmod_args(target: &Path) -> [&OsStr; 4] {
    [
        OsStr::new("chmod"),
        OsStr::new("644"),
        OsStr::new("--"),
        target.as_os_str(),
    ]
}

/// Copying a file onto itself truncates it before it is read.
fn is_same_file(source: &Path, target: &Path) -> bool {
    match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn run_sudo(args: &[&OsStr]) -> Result<()> {
    let status = Command::new("sudo")
        .args(args)
        .status()
        .map_err(|e| LoaderError::staging(format!("Cannot run sudo: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(LoaderError::staging(format!(
            "sudo {} exited with {status}",
            args.first().map(|a| a.to_string_lossy()).unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stage_creates_dir_and_copies() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("events.csv");
        std::fs::write(&source, "event_id,event\n1,page_view\n").unwrap();

        let stager = LocalStager::new(dir.path().join("datasets/nested"), "events.csv");
        let staged = stager.stage(&source).unwrap();

        assert_eq!(staged.path, dir.path().join("datasets/nested/events.csv"));
        assert!(!staged.escalated);
        assert_eq!(
            std::fs::read_to_string(&staged.path).unwrap(),
            "event_id,event\n1,page_view\n"
        );
    }

    #[test]
    fn test_stage_overwrites_previous_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("new.csv");
        std::fs::write(&source, "new").unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("events.csv"), "old").unwrap();

        LocalStager::new(&data_dir, "events.csv").stage(&source).unwrap();

        assert_eq!(
            std::fs::read_to_string(data_dir.join("events.csv")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_stage_file_already_in_place() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("datasets");
        std::fs::create_dir_all(&data_dir).unwrap();
        let source = data_dir.join("events.csv");
        std::fs::write(&source, "event_id,event\n1,page_view\n").unwrap();

        let staged = LocalStager::new(&data_dir, "events.csv")
            .stage(&data_dir.join("./events.csv"))
            .unwrap();

        assert_eq!(staged.path, source);
        assert!(!staged.escalated);
        assert_eq!(
            std::fs::read_to_string(&source).unwrap(),
            "event_id,event\n1,page_view\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_permission_denied_without_sudo() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let source = dir.path().join("events.csv");
        std::fs::write(&source, "data").unwrap();
        let data_dir = dir.path().join("locked");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores directory permissions.
        if std::fs::write(data_dir.join("write_check"), "x").is_ok() {
            eprintln!("Skipping test: running with elevated privileges");
            return;
        }

        let result = LocalStager::new(&data_dir, "events.csv").stage(&source);
        std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, LoaderError::Staging(_)));
        assert!(err.to_string().contains("--sudo-fallback"));
        assert!(!data_dir.join("events.csv").exists());
    }

    #[test]
    fn test_stage_missing_source() {
        let dir = tempdir().unwrap();
        let stager = LocalStager::new(dir.path(), "events.csv");

        let err = stager.stage(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, LoaderError::Input(_)));
    }

    #[test]
    fn test_sudo_args_end_options_before_paths() {
        let source = Path::new("-rf.csv");
        let target = Path::new("/srv/data/events.csv");

        assert_eq!(
            sudo_copy_args(source, target),
            [
                OsStr::new("cp"),
                OsStr::new("--"),
                OsStr::new("-rf.csv"),
                OsStr::new("/srv/data/events.csv"),
            ]
        );
        assert_eq!(sudo_chmod_args(target)[2], OsStr::new("--"));
    }

    #[test]
    fn test_from_config() {
        let config = StagingConfig {
            data_dir: PathBuf::from("/srv/data"),
            target_name: "load.csv".to_string(),
            sudo_fallback: true,
            ..Default::default()
        };
        let stager = LocalStager::from_config(&config);

        assert_eq!(stager.target_path(), PathBuf::from("/srv/data/load.csv"));
        assert_eq!(stager.escalation, Escalation::Sudo);
    }
}
