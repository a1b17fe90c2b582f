//! Export and cleanup orchestration.
//!
//! Owns the template lifecycle for one call: fetch, materialize, parse, run, remove.

use super::relay::{BuildListener, BuildRelay, DefaultLogger, RelayContext};
use super::template::{ScratchTemplate, TemplateSource};
use crate::engine::{BuildEngine, BuildRequest, BuildScript};
use crate::error::BuildError;
use crate::model::{
    BuildEvent, MessageLevel, Project, TaskParameters, TaskSelector, CLEANUP_TASK,
    EXPORT_DIRECTORY, PROJECT_NAME, SOURCE_DIRECTORY, TRANSLATOR_FLAGS,
};
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One orchestration call, before it is run.
struct Invocation {
    selector: TaskSelector,
    parameters: TaskParameters,
    context: RelayContext,
    clear_sink: bool,
}

/// Runs the export and cleanup tasks of a build template against a project.
///
/// Calls for the same project must not overlap; they share the scratch template path.
pub struct BuildOrchestrator {
    template: TemplateSource,
    engine: Arc<dyn BuildEngine>,
    sink: Arc<dyn LogSink>,
    message_level: MessageLevel,
}

impl BuildOrchestrator {
    pub fn new(
        template: TemplateSource,
        engine: Arc<dyn BuildEngine>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            template,
            engine,
            sink,
            message_level: MessageLevel::Error,
        }
    }

    /// Threshold for engine messages forwarded to diagnostics.
    pub fn with_message_level(mut self, level: MessageLevel) -> Self {
        self.message_level = level;
        self
    }

    /// Run the template's default task, exporting `source_dir` into `destination_dir`.
    ///
    /// Both directories are expected to be validated by the caller.
    pub async fn run_export(
        &self,
        project: &Project,
        source_dir: &str,
        destination_dir: &str,
        translator_flags: Option<&str>,
    ) -> Result<(), BuildError> {
        let mut parameters = TaskParameters::new()
            .with(SOURCE_DIRECTORY, source_dir)
            .with(EXPORT_DIRECTORY, destination_dir);
        if let Some(flags) = translator_flags {
            parameters = parameters.with(TRANSLATOR_FLAGS, flags);
        }

        self.run(
            project,
            Invocation {
                selector: TaskSelector::Default,
                parameters,
                context: RelayContext {
                    source_dir: Some(source_dir.to_string()),
                    destination_dir: Some(destination_dir.to_string()),
                    project_name: project.name.clone(),
                },
                clear_sink: false,
            },
        )
        .await
    }

    /// Run the template's `CLEANUP` task for `project`, starting from a cleared sink.
    pub async fn run_cleanup(&self, project: &Project) -> Result<(), BuildError> {
        self.run(
            project,
            Invocation {
                selector: TaskSelector::Named(CLEANUP_TASK),
                parameters: TaskParameters::new().with(PROJECT_NAME, project.name.as_str()),
                context: RelayContext {
                    source_dir: None,
                    destination_dir: None,
                    project_name: project.name.clone(),
                },
                clear_sink: true,
            },
        )
        .await
    }

    async fn run(&self, project: &Project, invocation: Invocation) -> Result<(), BuildError> {
        let scratch = ScratchTemplate::claim(project.scratch_template_path());
        let result = self.execute(project, &scratch, invocation).await;
        // Remove the scratch copy before the result propagates.
        drop(scratch);

        match &result {
            Ok(()) => tracing::info!(project = %project.name, "build completed"),
            Err(e) => tracing::warn!(project = %project.name, "build failed: {e}"),
        }
        result
    }

    async fn execute(
        &self,
        project: &Project,
        scratch: &ScratchTemplate,
        invocation: Invocation,
    ) -> Result<(), BuildError> {
        let text = self.template.fetch().await?;
        scratch.materialize(&text).await?;
        let script = BuildScript::parse(&scratch.read().await?)?;

        let task = match invocation.selector {
            TaskSelector::Default => script.default_task().to_string(),
            TaskSelector::Named(name) => match script.task(name) {
                Some(task) => task.name.clone(),
                None => return Err(BuildError::UnknownTask(name.to_string())),
            },
        };

        if invocation.clear_sink {
            if let Err(e) = self.sink.clear() {
                tracing::warn!("failed to clear build log: {e}");
            }
        }

        tracing::info!(
            project = %project.name,
            task = %task,
            template = %self.template.describe(),
            "running build task"
        );

        let request = BuildRequest {
            script,
            task,
            parameters: invocation.parameters,
            base_dir: project.root.clone(),
            template_file: scratch.path().to_path_buf(),
        };

        let relay = BuildRelay::new(
            self.sink.clone(),
            invocation.context,
            DefaultLogger::new(self.message_level),
        );
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BuildEvent>();
        let relay_handle = tokio::spawn(pump_events(relay, event_rx));

        let outcome = self.engine.run(request, event_tx).await;

        // The engine dropped its sender; wait for every event to be relayed.
        if let Err(e) = relay_handle.await {
            tracing::warn!("build relay task failed: {e}");
        }

        outcome.map_err(BuildError::from)
    }
}

async fn pump_events<L: BuildListener>(
    mut listener: L,
    mut event_rx: mpsc::UnboundedReceiver<BuildEvent>,
) {
    while let Some(event) = event_rx.recv().await {
        listener.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptEngine;
    use crate::error::EngineError;
    use crate::model::EXPORT_TASK;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    const TEMPLATE: &str = r#"
default = "Export-ObjectiveC-Files"

[[task]]
name = "Export-ObjectiveC-Files"

[[task]]
name = "CLEANUP"
"#;

    /// Emits start/finish for the requested task and records what it saw.
    #[derive(Default)]
    struct ScriptedEngine {
        fail: bool,
        seen: Mutex<Vec<(String, bool, TaskParameters)>>,
    }

    impl ScriptedEngine {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn seen(&self) -> Vec<(String, bool, TaskParameters)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BuildEngine for ScriptedEngine {
        async fn run(
            &self,
            request: BuildRequest,
            event_tx: mpsc::UnboundedSender<BuildEvent>,
        ) -> Result<(), EngineError> {
            self.seen.lock().unwrap().push((
                request.task.clone(),
                request.template_file.exists(),
                request.parameters.clone(),
            ));
            let _ = event_tx.send(BuildEvent::TaskStarted {
                task: request.task.clone(),
            });
            if self.fail {
                let _ = event_tx.send(BuildEvent::TaskFinished {
                    task: request.task.clone(),
                    error: Some("exit 1".into()),
                });
                return Err(EngineError::Other("simulated failure".into()));
            }
            let _ = event_tx.send(BuildEvent::TaskFinished {
                task: request.task,
                error: None,
            });
            Ok(())
        }
    }

    fn setup(template: &str) -> (tempfile::TempDir, Project, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("MyApp");
        std::fs::create_dir(&root).unwrap();
        let template_path = dir.path().join("template.toml");
        std::fs::write(&template_path, template).unwrap();
        (dir, Project::from_root(root), template_path)
    }

    fn orchestrator(
        template: &Path,
        engine: Arc<ScriptedEngine>,
        sink: Arc<MemorySink>,
    ) -> BuildOrchestrator {
        BuildOrchestrator::new(TemplateSource::File(template.to_path_buf()), engine, sink)
    }

    #[tokio::test]
    async fn export_narrates_and_removes_scratch_copy() {
        let (_dir, project, template) = setup(TEMPLATE);
        let engine = Arc::new(ScriptedEngine::default());
        let sink = Arc::new(MemorySink::new());

        orchestrator(&template, engine.clone(), sink.clone())
            .run_export(&project, "/src", "/dst", None)
            .await
            .unwrap();

        assert_eq!(
            sink.lines(),
            vec![
                "Exporting ObjectiveC Files",
                "Source Directory: /src",
                "Destination Directory: /dst",
                "Export finished.",
            ]
        );
        assert!(!project.scratch_template_path().exists());

        let seen = engine.seen();
        assert_eq!(seen.len(), 1);
        let (task, scratch_present, params) = &seen[0];
        assert_eq!(task, EXPORT_TASK);
        assert!(scratch_present);
        assert_eq!(params.get(SOURCE_DIRECTORY), Some("/src"));
        assert_eq!(params.get(EXPORT_DIRECTORY), Some("/dst"));
        assert_eq!(params.get(PROJECT_NAME), None);
        assert_eq!(params.get(TRANSLATOR_FLAGS), None);
    }

    #[tokio::test]
    async fn export_failure_still_removes_scratch_copy() {
        let (_dir, project, template) = setup(TEMPLATE);
        let engine = Arc::new(ScriptedEngine::failing());
        let sink = Arc::new(MemorySink::new());

        let err = orchestrator(&template, engine.clone(), sink)
            .run_export(&project, "/src", "/dst", Some("-g"))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::TaskExecutionFailed { .. }));
        assert!(!project.scratch_template_path().exists());
        assert!(engine.seen()[0].1);
        assert_eq!(engine.seen()[0].2.get(TRANSLATOR_FLAGS), Some("-g"));
    }

    #[tokio::test]
    async fn cleanup_runs_named_task_not_default() {
        let template_text = r#"
default = "something-else"

[[task]]
name = "something-else"

[[task]]
name = "CLEANUP"
"#;
        let (_dir, project, template) = setup(template_text);
        let engine = Arc::new(ScriptedEngine::default());
        let sink = Arc::new(MemorySink::new());
        sink.write_line("previous run").unwrap();

        orchestrator(&template, engine.clone(), sink.clone())
            .run_cleanup(&project)
            .await
            .unwrap();

        let seen = engine.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, CLEANUP_TASK);
        assert_eq!(seen[0].2.get(PROJECT_NAME), Some("MyApp"));
        assert_eq!(seen[0].2.get(SOURCE_DIRECTORY), None);

        assert_eq!(sink.clears(), 1);
        assert_eq!(
            sink.lines(),
            vec![
                "Cleans up internally generated files (<<project_name>>-classpath and <<project_name>>-prefix).",
                "Does not clean J2OBJC generated source files.",
                "Cleaning up project: MyApp",
                "Cleanup finished",
            ]
        );
        assert!(!project.scratch_template_path().exists());
    }

    #[tokio::test]
    async fn cleanup_without_task_is_unknown_task() {
        let (_dir, project, template) = setup("default = \"only\"\n[[task]]\nname = \"only\"\n");
        let engine = Arc::new(ScriptedEngine::default());
        let sink = Arc::new(MemorySink::new());

        let err = orchestrator(&template, engine.clone(), sink)
            .run_cleanup(&project)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::UnknownTask(ref name) if name == "CLEANUP"));
        assert!(engine.seen().is_empty());
        assert!(!project.scratch_template_path().exists());
    }

    #[tokio::test]
    async fn fetch_failure_leaves_no_trace() {
        let (dir, project, _template) = setup(TEMPLATE);
        let engine = Arc::new(ScriptedEngine::default());
        let sink = Arc::new(MemorySink::new());

        let err = orchestrator(&dir.path().join("missing.toml"), engine.clone(), sink.clone())
            .run_export(&project, "/src", "/dst", None)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::TemplateFetchFailed { .. }));
        assert!(sink.lines().is_empty());
        assert!(engine.seen().is_empty());
        assert!(!project.scratch_template_path().exists());
    }

    #[tokio::test]
    async fn invalid_template_is_reported_and_removed() {
        let (_dir, project, template) = setup("not = [valid");
        let engine = Arc::new(ScriptedEngine::default());
        let sink = Arc::new(MemorySink::new());

        let err = orchestrator(&template, engine, sink)
            .run_export(&project, "/src", "/dst", None)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::TemplateInvalid { .. }));
        assert!(!project.scratch_template_path().exists());
    }

    fn script_orchestrator(template: TemplateSource, sink: Arc<MemorySink>) -> BuildOrchestrator {
        BuildOrchestrator::new(template, Arc::new(ScriptEngine::new()), sink)
    }

    #[tokio::test]
    async fn bundled_export_copies_objective_c_sources() {
        let (_dir, project, _template) = setup(TEMPLATE);
        let source = project.root.join("gen$HOME `x`");
        let package = source.join("com").join("example");
        std::fs::create_dir_all(&package).unwrap();
        for file in ["Foo.h", "Foo.m", "Bar.mm", "Foo.java"] {
            std::fs::write(package.join(file), file).unwrap();
        }
        let destination = project.root.join("out dir");
        let sink = Arc::new(MemorySink::new());

        script_orchestrator(TemplateSource::Bundled, sink.clone())
            .run_export(
                &project,
                &source.to_string_lossy(),
                &destination.to_string_lossy(),
                Some("-g"),
            )
            .await
            .unwrap();

        let exported = destination.join("com").join("example");
        for file in ["Foo.h", "Foo.m", "Bar.mm"] {
            assert_eq!(std::fs::read_to_string(exported.join(file)).unwrap(), file);
        }
        assert!(!exported.join("Foo.java").exists());
        assert_eq!(sink.lines().first().map(String::as_str), Some("Exporting ObjectiveC Files"));
        assert_eq!(sink.lines().last().map(String::as_str), Some("Export finished."));
        assert!(!project.scratch_template_path().exists());
    }

    #[tokio::test]
    async fn bundled_cleanup_removes_generated_files_only() {
        let (_dir, project, _template) = setup(TEMPLATE);
        let classpath = project.root.join("MyApp-classpath");
        let prefix = project.root.join("MyApp-prefix");
        std::fs::write(&classpath, "a,").unwrap();
        std::fs::write(&prefix, "p").unwrap();
        std::fs::write(project.prefix_properties_file(), "com.example=EX\n").unwrap();
        let sink = Arc::new(MemorySink::new());

        script_orchestrator(TemplateSource::Bundled, sink.clone())
            .run_cleanup(&project)
            .await
            .unwrap();

        assert!(!classpath.exists());
        assert!(!prefix.exists());
        assert!(project.prefix_properties_file().exists());
        assert_eq!(sink.clears(), 1);
        assert_eq!(sink.lines().last().map(String::as_str), Some("Cleanup finished"));
        assert!(!project.scratch_template_path().exists());
    }

    #[tokio::test]
    async fn failing_step_still_removes_scratch_copy() {
        let template_text = r#"
default = "Export-ObjectiveC-Files"

[[task]]
name = "Export-ObjectiveC-Files"
steps = ["test -f \"${template.file}\"", "exit 7"]
"#;
        let (_dir, project, template) = setup(template_text);
        let sink = Arc::new(MemorySink::new());

        let err = script_orchestrator(TemplateSource::File(template), sink.clone())
            .run_export(&project, "/src", "/dst", None)
            .await
            .unwrap_err();

        match err {
            BuildError::TaskExecutionFailed {
                cause: EngineError::StepFailed { status, .. },
            } => assert_eq!(status, "7"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!project.scratch_template_path().exists());
        assert_eq!(sink.lines().last().map(String::as_str), Some("Export finished."));
    }
}
