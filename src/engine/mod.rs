mod script;
mod step;

pub use script::BuildScript;

use crate::error::EngineError;
use crate::model::{BuildEvent, TaskParameters};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Everything an engine needs to run one task of a parsed template.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub script: BuildScript,
    /// Resolved task name; callers map selectors to names before dispatch.
    pub task: String,
    pub parameters: TaskParameters,
    /// Root directory steps run in, exposed to the template as `basedir`.
    pub base_dir: PathBuf,
    /// Materialized template path, exposed as `template.file`.
    pub template_file: PathBuf,
}

#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Run `request.task` and its dependencies to completion.
    async fn run(
        &self,
        request: BuildRequest,
        event_tx: mpsc::UnboundedSender<BuildEvent>,
    ) -> Result<(), EngineError>;
}

/// Runs template steps as `sh -c` subprocesses.
#[derive(Debug, Default, Clone)]
pub struct ScriptEngine;

impl ScriptEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildEngine for ScriptEngine {
    async fn run(
        &self,
        request: BuildRequest,
        event_tx: mpsc::UnboundedSender<BuildEvent>,
    ) -> Result<(), EngineError> {
        let mut properties: BTreeMap<String, String> = request
            .parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        properties.insert(
            "basedir".to_string(),
            request.base_dir.to_string_lossy().into_owned(),
        );
        properties.insert(
            "template.file".to_string(),
            request.template_file.to_string_lossy().into_owned(),
        );

        let env = step::environment(&properties);

        let order = request.script.execution_order(&request.task)?;
        tracing::debug!(
            script = request.script.name.as_deref().unwrap_or("unnamed"),
            task = %request.task,
            tasks = ?order.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "resolved execution order"
        );

        for task in order {
            if let Some(prop) = task.if_set.as_deref() {
                if !properties.contains_key(prop) {
                    tracing::debug!(task = %task.name, prop, "skipping task, property unset");
                    continue;
                }
            }
            if let Some(prop) = task.unless.as_deref() {
                if properties.contains_key(prop) {
                    tracing::debug!(task = %task.name, prop, "skipping task, property set");
                    continue;
                }
            }

            if let Some(description) = task.description.as_deref() {
                tracing::debug!(task = %task.name, "{description}");
            }
            let _ = event_tx.send(BuildEvent::TaskStarted {
                task: task.name.clone(),
            });

            let mut outcome = Ok(());
            for raw in &task.steps {
                let command = step::substitute(raw, &properties);
                if let Err(e) =
                    step::run_step(&task.name, &command, &request.base_dir, &env, &event_tx).await
                {
                    outcome = Err(e);
                    break;
                }
            }

            let _ = event_tx.send(BuildEvent::TaskFinished {
                task: task.name.clone(),
                error: outcome.as_ref().err().map(|e| e.to_string()),
            });
            outcome?;
        }

        Ok(())
    }
}
