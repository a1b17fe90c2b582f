//! Translation of engine lifecycle events into narrated log lines.

use crate::model::{BuildEvent, MessageLevel, CLEANUP_TASK, EXPORT_TASK};
use crate::sink::LogSink;
use std::sync::Arc;

/// Receives engine events for one build run.
pub trait BuildListener: Send {
    fn task_started(&mut self, task: &str);

    fn task_finished(&mut self, task: &str, error: Option<&str>);

    fn message_logged(&mut self, _task: &str, _level: MessageLevel, _text: &str) {}

    fn on_event(&mut self, event: BuildEvent) {
        match event {
            BuildEvent::TaskStarted { task } => self.task_started(&task),
            BuildEvent::TaskFinished { task, error } => {
                self.task_finished(&task, error.as_deref())
            }
            BuildEvent::Message { task, level, text } => self.message_logged(&task, level, &text),
        }
    }
}

/// Engine-level logging: reports messages at or above a threshold through `tracing`.
/// Task failures are always reported.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    threshold: MessageLevel,
}

impl DefaultLogger {
    pub fn new(threshold: MessageLevel) -> Self {
        Self { threshold }
    }
}

impl BuildListener for DefaultLogger {
    fn task_started(&mut self, task: &str) {
        tracing::debug!(task, "task started");
    }

    fn task_finished(&mut self, task: &str, error: Option<&str>) {
        match error {
            Some(error) => tracing::error!(task, "task failed: {error}"),
            None => tracing::debug!(task, "task finished"),
        }
    }

    fn message_logged(&mut self, task: &str, level: MessageLevel, text: &str) {
        if level > self.threshold {
            return;
        }
        match level {
            MessageLevel::Error => tracing::error!(task, "{text}"),
            MessageLevel::Warn => tracing::warn!(task, "{text}"),
            MessageLevel::Info => tracing::info!(task, "{text}"),
            MessageLevel::Debug => tracing::debug!(task, "{text}"),
        }
    }
}

/// Values narrated alongside the export and cleanup banners.
#[derive(Debug, Clone, Default)]
pub struct RelayContext {
    pub source_dir: Option<String>,
    pub destination_dir: Option<String>,
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RelayState {
    Idle,
    Started(String),
}

/// Narrates the export and cleanup tasks to a log sink; everything also reaches the
/// default logger.
pub struct BuildRelay {
    sink: Arc<dyn LogSink>,
    context: RelayContext,
    logger: DefaultLogger,
    state: RelayState,
}

impl BuildRelay {
    pub fn new(sink: Arc<dyn LogSink>, context: RelayContext, logger: DefaultLogger) -> Self {
        Self {
            sink,
            context,
            logger,
            state: RelayState::Idle,
        }
    }

    fn write(&self, lines: &[String]) {
        for line in lines {
            if let Err(e) = self.sink.write_line(line) {
                tracing::warn!(line = %line, "failed to write build narration: {e}");
            }
        }
    }
}

impl BuildListener for BuildRelay {
    fn task_started(&mut self, task: &str) {
        self.logger.task_started(task);
        if let RelayState::Started(previous) = &self.state {
            tracing::trace!(previous = %previous, task, "task started before previous finished");
        }
        self.state = RelayState::Started(task.to_string());

        let lines = match task {
            EXPORT_TASK => vec![
                "Exporting ObjectiveC Files".to_string(),
                format!(
                    "Source Directory: {}",
                    self.context.source_dir.as_deref().unwrap_or_default()
                ),
                format!(
                    "Destination Directory: {}",
                    self.context.destination_dir.as_deref().unwrap_or_default()
                ),
            ],
            CLEANUP_TASK => vec![
                "Cleans up internally generated files (<<project_name>>-classpath and <<project_name>>-prefix).".to_string(),
                "Does not clean J2OBJC generated source files.".to_string(),
                format!("Cleaning up project: {}", self.context.project_name),
            ],
            _ => return,
        };
        self.write(&lines);
    }

    fn task_finished(&mut self, task: &str, error: Option<&str>) {
        self.logger.task_finished(task, error);
        self.state = RelayState::Idle;

        let line = match task {
            EXPORT_TASK => "Export finished.",
            CLEANUP_TASK => "Cleanup finished",
            _ => return,
        };
        self.write(&[line.to_string()]);
    }

    fn message_logged(&mut self, task: &str, level: MessageLevel, text: &str) {
        self.logger.message_logged(task, level, text);
    }
}
