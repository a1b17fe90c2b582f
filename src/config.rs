//! Per-project translator configuration record.

use std::collections::BTreeMap;
use std::path::Path;

/// The fixed set of configuration keys stored per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    InitializeFirstTime,
    GenerateDebuggingSupport,
    NoPackageDirectories,
    XLanguageObjectiveC,
    XLanguageObjectiveCpp,
    UseReferenceCounting,
    UseGc,
    UseArc,
    ErrorToWarning,
    Quiet,
    Verbose,
    NoInlineFieldAccess,
    NoGenerateTestMain,
    IgnoreMissingImports,
    PrintConvertedSources,
    TimingInfo,
    DeadCodeReport,
    MethodMappingFile,
    Bootclasspath,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 19] = [
        ConfigKey::InitializeFirstTime,
        ConfigKey::GenerateDebuggingSupport,
        ConfigKey::NoPackageDirectories,
        ConfigKey::XLanguageObjectiveC,
        ConfigKey::XLanguageObjectiveCpp,
        ConfigKey::UseReferenceCounting,
        ConfigKey::UseGc,
        ConfigKey::UseArc,
        ConfigKey::ErrorToWarning,
        ConfigKey::Quiet,
        ConfigKey::Verbose,
        ConfigKey::NoInlineFieldAccess,
        ConfigKey::NoGenerateTestMain,
        ConfigKey::IgnoreMissingImports,
        ConfigKey::PrintConvertedSources,
        ConfigKey::TimingInfo,
        ConfigKey::DeadCodeReport,
        ConfigKey::MethodMappingFile,
        ConfigKey::Bootclasspath,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::InitializeFirstTime => "INITIALIZE_FIRST_TIME",
            ConfigKey::GenerateDebuggingSupport => "GENERATE_DEBUGGING_SUPPORT",
            ConfigKey::NoPackageDirectories => "NO_PACKAGE_DIRECTORIES",
            ConfigKey::XLanguageObjectiveC => "X_LANGUAGE_OBJECTIVE_C",
            ConfigKey::XLanguageObjectiveCpp => "X_LANGUAGE_OBJECTIVE_CPP",
            ConfigKey::UseReferenceCounting => "USE_REFERENCE_COUNTING",
            ConfigKey::UseGc => "USE_GC",
            ConfigKey::UseArc => "USE_ARC",
            ConfigKey::ErrorToWarning => "ERROR_TO_WARNING",
            ConfigKey::Quiet => "QUIET",
            ConfigKey::Verbose => "VERBOSE",
            ConfigKey::NoInlineFieldAccess => "NO_INLINE_FIELD_ACCESS",
            ConfigKey::NoGenerateTestMain => "NO_GENERATE_TEST_MAIN",
            ConfigKey::IgnoreMissingImports => "IGNORE_MISSING_IMPORTS",
            ConfigKey::PrintConvertedSources => "PRINT_CONVERTED_SOURCES",
            ConfigKey::TimingInfo => "TIMING_INFO",
            ConfigKey::DeadCodeReport => "DEAD_CODE_REPORT",
            ConfigKey::MethodMappingFile => "METHOD_MAPPING_FILE",
            ConfigKey::Bootclasspath => "BOOTCLASSPATH",
        }
    }

    /// Keys holding file paths rather than boolean flags.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            ConfigKey::DeadCodeReport | ConfigKey::MethodMappingFile | ConfigKey::Bootclasspath
        )
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        ConfigKey::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown configuration key: {s}"))
    }
}

/// A snapshot of every configuration key for one project. Missing entries are unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRecord {
    values: BTreeMap<ConfigKey, String>,
}

impl ConfigRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn unset(&mut self, key: ConfigKey) {
        self.values.remove(&key);
    }

    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// True when the value parses as boolean `true`.
    pub fn is_enabled(&self, key: ConfigKey) -> bool {
        self.get(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn has_text(&self, key: ConfigKey) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Value of a path key, with unset read as the empty string.
    pub fn text(&self, key: ConfigKey) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Whether defaults have been written for this project before.
    pub fn defaults_initialized(&self) -> bool {
        self.get(ConfigKey::GenerateDebuggingSupport).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfigKey, Option<&str>)> {
        ConfigKey::ALL.into_iter().map(|k| (k, self.get(k)))
    }

    /// Build a record from stored name/value pairs, dropping names outside the key set.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Self {
        let mut record = Self::new();
        for (name, value) in entries {
            match (name.parse::<ConfigKey>(), value) {
                (Ok(key), Some(value)) => record.set(key, value),
                (Err(_), _) => tracing::debug!(name, "ignoring unknown configuration key"),
                (Ok(_), None) => {}
            }
        }
        record
    }
}

/// Values written the first time a project is configured.
pub fn default_record() -> ConfigRecord {
    let mut record = ConfigRecord::new().with(ConfigKey::InitializeFirstTime, "true");
    for key in ConfigKey::ALL {
        if key == ConfigKey::InitializeFirstTime || key.is_text() {
            continue;
        }
        record.set(key, (key == ConfigKey::UseReferenceCounting).to_string());
    }
    record
}

/// Translator command-line flags described by `record`.
pub fn translator_flags(
    record: &ConfigRecord,
    classpath: &[String],
    prefix_file: Option<&Path>,
) -> Vec<String> {
    let mut flags = Vec::new();
    let switches = [
        (ConfigKey::GenerateDebuggingSupport, "-g"),
        (ConfigKey::NoPackageDirectories, "--no-package-directories"),
        (ConfigKey::UseReferenceCounting, "-use-reference-counting"),
        (ConfigKey::UseGc, "-use-gc"),
        (ConfigKey::UseArc, "-use-arc"),
        (ConfigKey::ErrorToWarning, "-Werror"),
        (ConfigKey::Quiet, "--quiet"),
        (ConfigKey::Verbose, "--verbose"),
        (ConfigKey::NoInlineFieldAccess, "--no-inline-field-access"),
        (ConfigKey::NoGenerateTestMain, "--no-generate-test-main"),
        (ConfigKey::IgnoreMissingImports, "--ignore-missing-imports"),
        (ConfigKey::PrintConvertedSources, "--print-converted-sources"),
        (ConfigKey::TimingInfo, "-t"),
    ];
    for (key, flag) in switches {
        if record.is_enabled(key) {
            flags.push(flag.to_string());
        }
    }

    if record.is_enabled(ConfigKey::XLanguageObjectiveCpp) {
        flags.extend(["-x".to_string(), "objective-c++".to_string()]);
    } else if record.is_enabled(ConfigKey::XLanguageObjectiveC) {
        flags.extend(["-x".to_string(), "objective-c".to_string()]);
    }

    let valued = [
        (ConfigKey::DeadCodeReport, "--dead-code-report"),
        (ConfigKey::MethodMappingFile, "--mapping"),
        (ConfigKey::Bootclasspath, "-bootclasspath"),
    ];
    for (key, flag) in valued {
        if record.has_text(key) {
            flags.push(flag.to_string());
            flags.push(record.text(key).to_string());
        }
    }

    if !classpath.is_empty() {
        flags.push("-classpath".to_string());
        flags.push(classpath.join(":"));
    }
    if let Some(prefix_file) = prefix_file {
        flags.push("--prefixes".to_string());
        flags.push(prefix_file.display().to_string());
    }
    flags
}
