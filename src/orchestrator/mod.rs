//! Build orchestration.
//!
//! This module owns the template lifecycle for export and cleanup calls and the relay
//! that narrates engine events to the log sink. The CLI calls into this module; the
//! engine itself knows nothing about narration.

mod controller;
mod relay;
mod template;

pub(crate) use controller::BuildOrchestrator;
#[cfg(test)]
pub(crate) use template::BUNDLED_TEMPLATE;
pub(crate) use template::TemplateSource;
