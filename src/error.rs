//! Error types for build orchestration.

use thiserror::Error;

/// Failures of an export or cleanup call.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read build template from {source_desc}: {message}")]
    TemplateFetchFailed {
        source_desc: String,
        message: String,
    },

    #[error("failed to write build template to {path}: {message}")]
    TemplateMaterializeFailed { path: String, message: String },

    #[error("invalid build template: {message}")]
    TemplateInvalid { message: String },

    #[error("build template does not define task {0:?}")]
    UnknownTask(String),

    #[error("build task failed: {cause}")]
    TaskExecutionFailed {
        #[source]
        cause: EngineError,
    },

    #[error("failed to remove build template {path}: {message}")]
    TeardownFailed { path: String, message: String },
}

impl BuildError {
    /// Process exit code reported by the CLI for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::TemplateFetchFailed { .. } => 2,
            BuildError::TemplateMaterializeFailed { .. } => 3,
            BuildError::UnknownTask(_) => 4,
            BuildError::TaskExecutionFailed { .. } => 5,
            BuildError::TemplateInvalid { .. } => 6,
            BuildError::TeardownFailed { .. } => 1,
        }
    }
}

impl From<EngineError> for BuildError {
    fn from(cause: EngineError) -> Self {
        BuildError::TaskExecutionFailed { cause }
    }
}

/// Failures reported by a build engine while running tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {task:?} step `{command}` exited with status {status}")]
    StepFailed {
        task: String,
        command: String,
        status: String,
    },

    #[error("task {task:?} could not spawn `{command}`: {source}")]
    Spawn {
        task: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task {task:?} depends on unknown task {dependency:?}")]
    UnknownDependency { task: String, dependency: String },

    #[error("circular dependency involving task {0:?}")]
    DependencyCycle(String),

    #[error("{0}")]
    Other(String),
}
