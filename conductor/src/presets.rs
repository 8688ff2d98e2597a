//! Named, fixed workflows shipped with the engine.

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

const BUILTIN_PRESETS: &str = include_str!("presets.yaml");

/// One step of a preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetStep {
    pub name: String,

    pub prompt: String,

    /// Model override for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Receive the original code instead of the previous step's output
    #[serde(default)]
    pub requires_input: bool,
}

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub description: String,

    #[serde(default)]
    pub steps: Vec<PresetStep>,
}

#[derive(Deserialize)]
struct PresetFile {
    presets: Vec<Preset>,
}

/// Parse a presets document (`presets:` list at the top level)
pub fn parse_presets(yaml: &str) -> OrchestratorResult<Vec<Preset>> {
    serde_yaml::from_str::<PresetFile>(yaml)
        .map(|file| file.presets)
        .map_err(|e| OrchestratorError::Config(format!("Invalid presets document: {}", e)))
}

/// All built-in presets
pub fn get_presets() -> OrchestratorResult<Vec<Preset>> {
    parse_presets(BUILTIN_PRESETS)
}

/// Look up a built-in preset by id
pub fn get_preset(id: &str) -> OrchestratorResult<Preset> {
    get_presets()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| OrchestratorError::UnknownPreset(id.to_string()))
}
