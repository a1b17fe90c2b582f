use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the template task that exports generated Objective-C files.
pub const EXPORT_TASK: &str = "Export-ObjectiveC-Files";
/// Name of the template task that removes internally generated files.
pub const CLEANUP_TASK: &str = "CLEANUP";

pub const SOURCE_DIRECTORY: &str = "SOURCE_DIRECTORY";
pub const EXPORT_DIRECTORY: &str = "EXPORT_DIRECTORY";
pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const TRANSLATOR_FLAGS: &str = "TRANSLATOR_FLAGS";

/// A project directory the tool operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Stable identity used as the configuration store key.
    pub id: String,
    pub root: PathBuf,
    /// Display name, the last component of the root directory.
    pub name: String,
}

impl Project {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self {
            id: root.to_string_lossy().into_owned(),
            root,
            name,
        }
    }

    /// Project-local path the build template is materialized to.
    pub fn scratch_template_path(&self) -> PathBuf {
        self.root.join(".export-template.toml")
    }

    /// `<root>/<name>-prefixes.properties`, the translator's package prefix file.
    pub fn prefix_properties_file(&self) -> PathBuf {
        self.root.join(format!("{}-prefixes.properties", self.name))
    }

    pub fn has_prefix_properties_file(&self) -> bool {
        self.prefix_properties_file().is_file()
    }
}

/// Which task of the template an orchestration call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSelector {
    /// The template's declared default task.
    Default,
    /// A task looked up by its literal name.
    Named(&'static str),
}

/// String parameters bound into the template before execution.
///
/// Only keys relevant to the selected task are ever inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskParameters(BTreeMap<String, String>);

impl TaskParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Verbosity of engine messages, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl std::str::FromStr for MessageLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(MessageLevel::Error),
            "warn" | "warning" => Ok(MessageLevel::Warn),
            "info" => Ok(MessageLevel::Info),
            "debug" => Ok(MessageLevel::Debug),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Lifecycle events emitted by the build engine and consumed by listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    TaskStarted {
        task: String,
    },
    TaskFinished {
        task: String,
        /// Set when the task failed.
        error: Option<String>,
    },
    Message {
        task: String,
        level: MessageLevel,
        text: String,
    },
}
