use serde::{Deserialize, Serialize};
use std::fmt;

/// Rough characters-per-token ratio used for cost estimation.
const CHARS_PER_TOKEN: usize = 4;

/// Tokens taken by the fixed system prompt, instruction and function schema.
const PROMPT_OVERHEAD_TOKENS: u32 = 350;

/// Expected completion size for a function call carrying 5-15 tags.
pub const ESTIMATED_OUTPUT_TOKENS: u32 = 100;

/// Capabilities a model may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFeature {
    /// The model accepts a declared function schema and answers by calling it.
    FunctionCalling,
}

/// Identifies a callable remote model and its pricing.
///
/// Built-in descriptors come from [`builtin_models`]; user-defined ones are
/// read from the `custom_models` table of the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default = "default_features")]
    pub features: Vec<ModelFeature>,
    /// Context window in tokens
    pub context: u32,
    /// USD per 1000 input tokens
    #[serde(alias = "inputCost1KTokens")]
    pub input_cost_1k_tokens: f64,
    /// USD per 1000 output tokens
    #[serde(alias = "outputCost1KTokens")]
    pub output_cost_1k_tokens: f64,
}

fn default_features() -> Vec<ModelFeature> {
    vec![ModelFeature::FunctionCalling]
}

/// Approximate size and price of a single tag-suggestion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    /// The prompt alone would not fit the model's context window
    pub exceeds_context: bool,
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "~{} input + ~{} output tokens, estimated cost ${:.5}",
            self.input_tokens, self.output_tokens, self.cost_usd
        )?;
        if self.exceeds_context {
            write!(f, " (exceeds the model context window)")?;
        }
        Ok(())
    }
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        context: u32,
        input_cost_1k_tokens: f64,
        output_cost_1k_tokens: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            features: default_features(),
            context,
            input_cost_1k_tokens,
            output_cost_1k_tokens,
        }
    }

    pub fn supports_function_calling(&self) -> bool {
        self.features.contains(&ModelFeature::FunctionCalling)
    }

    /// Estimates the token usage and price of tagging `text` with `known_tags`
    /// supplied as context.
    ///
    /// Token counts use a characters/4 heuristic; this is a budgeting aid, not
    /// a tokenizer.
    pub fn estimate_cost(&self, text: &str, known_tags: &[String]) -> CostEstimate {
        let context_chars: usize =
            text.chars().count() + known_tags.iter().map(|t| t.chars().count() + 2).sum::<usize>();
        let input_tokens = PROMPT_OVERHEAD_TOKENS
            + u32::try_from(context_chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX);
        let output_tokens = ESTIMATED_OUTPUT_TOKENS;

        let cost_usd = f64::from(input_tokens) / 1000.0 * self.input_cost_1k_tokens
            + f64::from(output_tokens) / 1000.0 * self.output_cost_1k_tokens;

        CostEstimate {
            input_tokens,
            output_tokens,
            cost_usd,
            exceeds_context: input_tokens.saturating_add(output_tokens) > self.context,
        }
    }
}

/// Models available without any configuration.
pub fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5 Turbo", 16000, 0.0005, 0.0015),
        ModelDescriptor::new("gpt-4o-mini", "GPT-4o mini", 16384, 0.00015, 0.0006),
    ]
}

/// Looks a model up by id among the built-in and custom models.
///
/// Custom models shadow built-ins with the same id.
pub fn find_model(id: &str, custom: &[ModelDescriptor]) -> Option<ModelDescriptor> {
    custom
        .iter()
        .find(|m| m.id == id)
        .cloned()
        .or_else(|| builtin_models().into_iter().find(|m| m.id == id))
}
