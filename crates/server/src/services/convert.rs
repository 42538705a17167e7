//! Document-to-PDF conversion for print retrieval.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;

use printdrop_core::FileKind;
use printdrop_core::types::storage_key::sanitize_name;

use crate::config::ConverterConfig;

/// Errors that can occur while converting a document.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("converter produced no output")]
    NoOutput,
}

/// Turns a document into PDF bytes.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Converter name for logs.
    fn name(&self) -> &'static str;

    /// Convert `bytes` of `kind`, originally called `file_name`, to PDF.
    async fn to_pdf(
        &self,
        file_name: &str,
        kind: FileKind,
        bytes: Bytes,
    ) -> Result<Bytes, ConversionError>;
}

/// Build the configured converter, if any.
#[must_use]
pub fn from_config(config: &ConverterConfig) -> Option<std::sync::Arc<dyn DocumentConverter>> {
    match config {
        ConverterConfig::None => None,
        ConverterConfig::LibreOffice { program, timeout } => Some(std::sync::Arc::new(
            LibreOfficeConverter::new(program.clone(), *timeout),
        )),
    }
}

/// Converts through a headless `LibreOffice` (`soffice`) process.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    program: PathBuf,
    timeout: Duration,
}

impl LibreOfficeConverter {
    #[must_use]
    pub const fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    async fn run(&self, dir: &Path, input: &Path) -> Result<(), ConversionError> {
        let child = Command::new(&self.program)
            .arg(profile_arg(dir)?)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ConversionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `soffice` option pointing the user profile inside `dir`. Concurrent
/// instances sharing a profile hand work to each other or fail on its lock.
fn profile_arg(dir: &Path) -> Result<String, ConversionError> {
    let profile = url::Url::from_directory_path(dir.join("profile")).map_err(|()| {
        std::io::Error::other(format!("no file URL for {}", dir.display()))
    })?;
    Ok(format!("-env:UserInstallation={profile}"))
}

#[async_trait]
impl DocumentConverter for LibreOfficeConverter {
    fn name(&self) -> &'static str {
        "libreoffice"
    }

    async fn to_pdf(
        &self,
        file_name: &str,
        kind: FileKind,
        bytes: Bytes,
    ) -> Result<Bytes, ConversionError> {
        let dir = tempfile::tempdir()?;
        let stem = Path::new(&sanitize_name(file_name))
            .file_stem()
            .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().into_owned());
        let input = dir.path().join(format!("{stem}.{}", kind.short_name()));
        tokio::fs::write(&input, &bytes).await?;

        self.run(dir.path(), &input).await?;

        let output = dir.path().join(format!("{stem}.pdf"));
        match tokio::fs::read(&output).await {
            Ok(pdf) if !pdf.is_empty() => Ok(Bytes::from(pdf)),
            Ok(_) => Err(ConversionError::NoOutput),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConversionError::NoOutput),
            Err(e) => Err(e.into()),
        }
    }
}

/// Name a converted file gets: the original stem with a `.pdf` extension.
#[must_use]
pub fn pdf_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map_or_else(|| original.to_string(), |s| s.to_string_lossy().into_owned());
    format!("{stem}.pdf")
}
