// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt template with placeholder substitution.

use std::path::Path;

use chamber_core::ChamberError;

/// The built-in listener-companion prompt.
pub const DEFAULT_TEMPLATE: &str = "\
You are {personality}, a music-history companion for one listener.
You answer questions about their streaming history with warmth and precision.

Evidence about the listener:
{evidence}

Data insights:
{insights}

The dataset covers {date_range}. Today is {today}.

Ground every claim in the evidence above. When the evidence does not cover a
question, say so instead of guessing.";

/// Values substituted into the template.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    pub personality: &'a str,
    pub evidence: &'a str,
    pub insights: &'a str,
    pub date_range: &'a str,
    pub today: &'a str,
}

/// A prompt template. Placeholders are `{personality}`, `{evidence}`,
/// `{insights}`, `{date_range}` and `{today}`; anything else is left alone.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Resolve a template from configuration: an inline string wins over a
    /// file path, and with neither the built-in template is used.
    pub fn from_parts(
        template: Option<&str>,
        template_file: Option<&Path>,
    ) -> Result<Self, ChamberError> {
        if let Some(inline) = template {
            return Ok(Self::new(inline));
        }
        if let Some(path) = template_file {
            let contents = std::fs::read_to_string(path).map_err(|err| {
                ChamberError::Config(format!(
                    "cannot read prompt template {}: {err}",
                    path.display()
                ))
            })?;
            return Ok(Self::new(contents));
        }
        Ok(Self::default())
    }

    pub fn render(&self, inputs: &PromptInputs<'_>) -> String {
        self.template
            .replace("{personality}", inputs.personality)
            .replace("{evidence}", inputs.evidence)
            .replace("{insights}", inputs.insights)
            .replace("{date_range}", inputs.date_range)
            .replace("{today}", inputs.today)
    }
}
