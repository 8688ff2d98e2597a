//! Data types shared between the engine and its collaborators.
//!
//! - **Step** - a unit of work planned for one model invocation
//! - **StepResult** - the immutable outcome of executing a step
//! - **TokenUsage** - additive token accounting

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Free-form context handed to executors, keyed by top-level name.
pub type StepContext = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Step Types
// ============================================================================

/// Classification tag attached to every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    #[default]
    Analyze,
    Refactor,
    Optimize,
    Document,
    Test,
    Review,
    Fix,
}

impl StepAction {
    /// All actions, in keyword precedence order.
    pub const ALL: [StepAction; 7] = [
        StepAction::Analyze,
        StepAction::Refactor,
        StepAction::Optimize,
        StepAction::Document,
        StepAction::Test,
        StepAction::Review,
        StepAction::Fix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Analyze => "analyze",
            StepAction::Refactor => "refactor",
            StepAction::Optimize => "optimize",
            StepAction::Document => "document",
            StepAction::Test => "test",
            StepAction::Review => "review",
            StepAction::Fix => "fix",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Estimated effort for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

/// Advisory note attached to a step that gates many later steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckInfo {
    /// Number of later steps depending on this one
    pub dependent_count: usize,

    /// Suggested remedy
    pub suggestion: String,
}

/// Single unit of work within a workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within one invocation
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Task text handed to the model
    #[serde(alias = "prompt")]
    pub description: String,

    #[serde(default)]
    pub action: StepAction,

    /// Optional caller-supplied type tag; takes precedence over `action`
    /// when computing signatures
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// File or symbol this step operates on
    #[serde(alias = "file", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub estimated_complexity: Complexity,

    /// Ids of steps that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_bottleneck: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottleneck_info: Option<BottleneckInfo>,
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: description.into(),
            action: StepAction::default(),
            kind: None,
            target: None,
            priority: Priority::default(),
            estimated_complexity: Complexity::default(),
            dependencies: Vec::new(),
            is_bottleneck: false,
            bottleneck_info: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// The type tag used for classification: explicit `type` if present,
    /// otherwise the action.
    pub fn type_or_action(&self) -> &str {
        self.kind.as_deref().unwrap_or(self.action.as_str())
    }
}

// ============================================================================
// Usage Types
// ============================================================================

/// Token counts reported by a model call. Missing fields count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,

    #[serde(default)]
    pub completion_tokens: u64,

    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

impl<'a> Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a TokenUsage>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of executing one step. `error` is present iff `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,

    /// Model that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub success: bool,

    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub usage: TokenUsage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock time around the executor call
    #[serde(default)]
    pub duration_ms: u64,

    /// Mesh round this result belongs to (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<usize>,

    /// Peer models whose outputs were folded into this result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaborated_with: Vec<String>,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            model: None,
            success: true,
            output: output.into(),
            usage: TokenUsage::default(),
            error: None,
            duration_ms: 0,
            round: None,
            collaborated_with: Vec::new(),
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            model: None,
            success: false,
            output: String::new(),
            usage: TokenUsage::default(),
            error: Some(error.into()),
            duration_ms: 0,
            round: None,
            collaborated_with: Vec::new(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Output of a successful result, `None` for failures.
    pub fn successful_output(&self) -> Option<&str> {
        self.success.then_some(self.output.as_str())
    }
}
