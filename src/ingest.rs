use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::SyncError;

/// Placeholder replaced by the downloaded file path in the configured command line.
pub const FILE_PLACEHOLDER: &str = "{file}";
/// Environment variable carrying the downloaded file path to the ingestion command.
pub const FILE_ENV: &str = "SFTPFEED_FILE";

/// Downstream consumer of a freshly downloaded data file.
pub trait Ingest {
    fn ingest(&self, file: &Path) -> Result<(), SyncError>;
}

/// Runs an external program once per downloaded file and waits for it.
///
/// The file path is passed explicitly: every `{file}` argument is substituted, or the path is
/// appended when no placeholder is present. Stdout/stderr are inherited.
#[derive(Debug, Clone)]
pub struct CommandIngest {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandIngest {
    /// `argv[0]` is resolved on `PATH` when it is a bare name.
    pub fn new(argv: &[String]) -> Result<Self, SyncError> {
        let (first, rest) = argv
            .split_first()
            .ok_or_else(|| SyncError::MissingEnv("INGEST_COMMAND".to_string()))?;
        let program = if Path::new(first).components().count() > 1 {
            PathBuf::from(first)
        } else {
            which::which(first).map_err(|e| {
                SyncError::InvalidEnv("INGEST_COMMAND".to_string(), format!("{}: {}", first, e))
            })?
        };
        Ok(Self { program, args: rest.to_vec() })
    }

    /// Arguments for one invocation against `file`.
    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let path = file.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    a.replace(FILE_PLACEHOLDER, &path)
                } else {
                    a.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(path.to_string());
        }
        args
    }
}

impl Ingest for CommandIngest {
    fn ingest(&self, file: &Path) -> Result<(), SyncError> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        let status = Command::new(&self.program)
            .args(self.args_for(file))
            .env(FILE_ENV, file)
            .status()
            .map_err(|e| SyncError::IngestSpawnFailed(self.program.display().to_string(), e.to_string()))?;
        if status.success() { Ok(()) } else { Err(SyncError::IngestExit(name, status.code())) }
    }
}
