use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};

static SUMMARIZE_TEMPLATE_JSON: &str = include_str!("prompts/summarize_template.json");

/// A prompt with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub input_variables: Vec<String>,
    pub template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Self {
        Self {
            input_variables: input_variables.iter().map(|&name| name.to_owned()).collect(),
            template: template.into(),
        }
    }

    pub fn summarize() -> LlmResult<Self> {
        Self::from_json(SUMMARIZE_TEMPLATE_JSON)
    }

    pub fn from_json(raw: &str) -> LlmResult<Self> {
        serde_json::from_str(raw)
            .map_err(|error| LlmError::Template(format!("invalid template json: {error}")))
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> LlmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|error| {
            LlmError::Template(format!("failed to read {}: {error}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Substitutes every declared variable in one pass, so placeholders that
    /// appear inside substituted values are left alone.
    pub fn format(&self, values: &[(&str, &str)]) -> LlmResult<String> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !values.iter().any(|(key, _)| *key == name.as_str()))
        {
            return Err(LlmError::Template(format!(
                "missing value for input variable `{missing}`"
            )));
        }

        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let substituted = after.find('}').and_then(|end| {
                let name = &after[..end];
                values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value, end))
            });

            match substituted {
                Some((value, end)) => {
                    output.push_str(value);
                    rest = &after[end + 1..];
                }
                None => {
                    output.push('{');
                    rest = after;
                }
            }
        }
        output.push_str(rest);

        Ok(output)
    }

    pub fn format_text(&self, text: &str) -> LlmResult<String> {
        self.format(&[("text", text)])
    }
}
