//! Persistent per-project configuration storage.

use crate::config::{ConfigKey, ConfigRecord};
use crate::model::Project;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Key/value configuration storage keyed by project identity.
pub trait ConfigStore: Send + Sync {
    /// Read the full record for `project`; a project never written reads as empty.
    fn load(&self, project: &Project) -> Result<ConfigRecord>;

    fn get(&self, project: &Project, key: ConfigKey) -> Result<Option<String>> {
        Ok(self.load(project)?.get(key).map(str::to_string))
    }

    /// Replace the stored record as one snapshot.
    fn set_all(&self, project: &Project, record: &ConfigRecord) -> Result<()>;

    fn classpath(&self, project: &Project) -> Result<Vec<String>>;

    fn set_classpath(&self, project: &Project, entries: &[String]) -> Result<()>;
}

/// Split a stored classpath string, skipping empty and comma-only entries.
pub fn parse_classpath(stored: Option<&str>) -> Vec<String> {
    let Some(stored) = stored else {
        return Vec::new();
    };
    if stored.trim().is_empty() {
        return Vec::new();
    }
    stored
        .split(',')
        .filter(|s| !s.is_empty() && *s != ",")
        .map(str::to_string)
        .collect()
}

/// Stored classpath form: every entry followed by a `,`.
pub fn join_classpath(entries: &[String]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry);
        out.push(',');
    }
    out
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredProject {
    #[serde(default)]
    project: String,
    #[serde(default)]
    updated_utc: String,
    #[serde(default)]
    properties: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    classpath: Option<String>,
}

/// One JSON document per project under a base directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    base_dir: PathBuf,
}

impl FileConfigStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<config dir>/j2objc-export/projects`.
    pub fn default_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("could not determine user config directory")?;
        Ok(base.join("j2objc-export").join("projects"))
    }

    fn project_file(&self, project: &Project) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", file_stem_for(&project.id)))
    }

    fn read(&self, project: &Project) -> Result<StoredProject> {
        let path = self.project_file(project);
        if !path.exists() {
            return Ok(StoredProject::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read project settings {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse project settings {}", path.display()))
    }

    fn write(&self, project: &Project, mut stored: StoredProject) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("create settings directory {}", self.base_dir.display()))?;

        stored.project = project.id.clone();
        stored.updated_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());

        let path = self.project_file(project);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&tmp, text).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("replace {}", path.display()))?;
        tracing::debug!(path = %path.display(), "saved project settings");
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, project: &Project) -> Result<ConfigRecord> {
        let stored = self.read(project)?;
        Ok(ConfigRecord::from_entries(
            stored
                .properties
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_deref())),
        ))
    }

    fn set_all(&self, project: &Project, record: &ConfigRecord) -> Result<()> {
        let mut stored = self.read(project)?;
        // Every key is rewritten so nothing from an older key set survives.
        stored.properties = ConfigKey::ALL
            .into_iter()
            .map(|k| (k.as_str().to_string(), record.get(k).map(str::to_string)))
            .collect();
        self.write(project, stored)
    }

    fn classpath(&self, project: &Project) -> Result<Vec<String>> {
        Ok(parse_classpath(self.read(project)?.classpath.as_deref()))
    }

    fn set_classpath(&self, project: &Project, entries: &[String]) -> Result<()> {
        let mut stored = self.read(project)?;
        stored.classpath = Some(join_classpath(entries));
        self.write(project, stored)
    }
}

/// Reversible file-name encoding of a project id.
fn file_stem_for(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02X}"));
        }
    }
    out
}
