//! Build template model and task ordering.

use crate::error::{BuildError, EngineError};
use serde::Deserialize;
use std::collections::HashSet;

/// A parsed build template.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildScript {
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the task run when no task is requested explicitly.
    pub default: String,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    /// Run only when this property is bound.
    #[serde(default, rename = "if")]
    pub if_set: Option<String>,
    /// Skip when this property is bound.
    #[serde(default)]
    pub unless: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl BuildScript {
    pub fn parse(text: &str) -> Result<Self, BuildError> {
        let script: BuildScript =
            toml::from_str(text).map_err(|e| BuildError::TemplateInvalid {
                message: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for task in &script.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(BuildError::TemplateInvalid {
                    message: format!("task {:?} is defined more than once", task.name),
                });
            }
        }
        if script.task(&script.default).is_none() {
            return Err(BuildError::TemplateInvalid {
                message: format!("default task {:?} is not defined", script.default),
            });
        }
        Ok(script)
    }

    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn default_task(&self) -> &str {
        &self.default
    }

    /// Tasks to run for `target`, dependencies first, each at most once.
    pub fn execution_order(&self, target: &str) -> Result<Vec<&TaskDef>, EngineError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut visiting = Vec::new();
        self.visit(target, None, &mut visiting, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        parent: Option<&str>,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<&'a TaskDef>,
    ) -> Result<(), EngineError> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(EngineError::DependencyCycle(name.to_string()));
        }
        let task = self.task(name).ok_or_else(|| match parent {
            Some(parent) => EngineError::UnknownDependency {
                task: parent.to_string(),
                dependency: name.to_string(),
            },
            None => EngineError::Other(format!("task {name:?} is not defined")),
        })?;

        visiting.push(name.to_string());
        for dep in &task.depends {
            self.visit(dep, Some(name), visiting, done, order)?;
        }
        visiting.pop();

        done.insert(name.to_string());
        order.push(task);
        Ok(())
    }
}
