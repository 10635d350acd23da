use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use common::config::ConversionConfig;
use tempfile::{Builder, NamedTempFile, TempDir};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error};

use crate::Converter;
use crate::error::ConversionError;

/// Runs an office-suite style converter as a child process:
/// `<binary> --convert-to pdf --outdir <dir> <input>`.
///
/// The staged input file and the output directory are scoped to a single
/// call and removed on every exit path, including timeouts.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    binary: String,
    timeout: Duration,
    work_dir: Option<PathBuf>,
}

impl ProcessConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            work_dir: None,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            work_dir: config.work_dir.clone(),
        }
    }

    /// Stage scratch files under `dir` instead of the system temp dir.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn scratch_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    async fn stage_input(
        &self,
        input: &[u8],
        original_filename: &str,
    ) -> Result<NamedTempFile, ConversionError> {
        let suffix = Path::new(original_filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let staged = Builder::new()
            .prefix("convert-")
            .suffix(&suffix)
            .tempfile_in(self.scratch_root())?;
        fs::write(staged.path(), input).await?;
        Ok(staged)
    }

    fn output_dir(&self) -> Result<TempDir, ConversionError> {
        Ok(Builder::new()
            .prefix("convert-out-")
            .tempdir_in(self.scratch_root())?)
    }
}

/// Name the converter gives its output: the input's file stem plus `.pdf`.
fn expected_output(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir.join(format!("{stem}.pdf"))
}

#[async_trait]
impl Converter for ProcessConverter {
    async fn convert(
        &self,
        input: &[u8],
        original_filename: &str,
    ) -> Result<Vec<u8>, ConversionError> {
        if input.is_empty() {
            return Err(ConversionError::EmptyInput);
        }

        // Both guards delete their paths when dropped.
        let staged = self.stage_input(input, original_filename).await?;
        let out_dir = self.output_dir()?;

        debug!(
            binary = %self.binary,
            input = %staged.path().display(),
            outdir = %out_dir.path().display(),
            "Running converter"
        );

        let child = Command::new(&self.binary)
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir.path())
            .arg(staged.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        // On timeout the child is dropped, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                error!(
                    filename = original_filename,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Converter timed out, process killed"
                );
                return Err(ConversionError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(
                filename = original_filename,
                exit_code = ?output.status.code(),
                stdout = %stdout,
                stderr = %stderr,
                "Cannot convert"
            );
            return Err(ConversionError::NonZeroExit {
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        let produced = expected_output(out_dir.path(), staged.path());
        match fs::read(&produced).await {
            Ok(pdf) => {
                debug!(
                    filename = original_filename,
                    bytes = pdf.len(),
                    "Converted"
                );
                Ok(pdf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                ConversionError::MissingOutput(produced.display().to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }
}
