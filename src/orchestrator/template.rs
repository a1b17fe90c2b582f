//! Build template sources and the project-local scratch copy.

use crate::error::BuildError;
use std::path::{Path, PathBuf};

/// Template compiled into the binary.
pub(crate) const BUNDLED_TEMPLATE: &str = include_str!("../../templates/export.toml");

/// Where the build template is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Bundled,
    File(PathBuf),
    Remote(String),
}

impl TemplateSource {
    /// Interpret a CLI/env value: `bundled`, an `http(s)://` URL, or a path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("bundled") {
            TemplateSource::Bundled
        } else if value.starts_with("http://") || value.starts_with("https://") {
            TemplateSource::Remote(value.to_string())
        } else {
            TemplateSource::File(PathBuf::from(value))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TemplateSource::Bundled => "bundled template".to_string(),
            TemplateSource::File(p) => p.display().to_string(),
            TemplateSource::Remote(url) => url.clone(),
        }
    }

    pub async fn fetch(&self) -> Result<String, BuildError> {
        let fail = |message: String| BuildError::TemplateFetchFailed {
            source_desc: self.describe(),
            message,
        };
        match self {
            TemplateSource::Bundled => Ok(BUNDLED_TEMPLATE.to_string()),
            TemplateSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| fail(e.to_string())),
            TemplateSource::Remote(url) => {
                let resp = reqwest::get(url.as_str())
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                let resp = resp.error_for_status().map_err(|e| fail(e.to_string()))?;
                resp.text().await.map_err(|e| fail(e.to_string()))
            }
        }
    }
}

/// The materialized template. Removed when dropped.
pub(crate) struct ScratchTemplate {
    path: PathBuf,
}

impl ScratchTemplate {
    /// Claim `path` for this call; whatever is there is removed on drop.
    pub(crate) fn claim(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Write `text` unless a copy is already present.
    pub(crate) async fn materialize(&self, text: &str) -> Result<(), BuildError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!(path = %self.path.display(), "reusing existing template copy");
            return Ok(());
        }
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| BuildError::TemplateMaterializeFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
    }

    pub(crate) async fn read(&self) -> Result<String, BuildError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| BuildError::TemplateMaterializeFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
    }

    fn remove(&self) -> Result<(), BuildError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::TeardownFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for ScratchTemplate {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!("{e}");
        }
    }
}
