//! Loading settings from JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use chat_templates::TemplateId;
use tracing::{debug, warn};

use crate::schema::ChatSettings;

impl ChatSettings {
    /// Reads and validates settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid JSON, holds an invalid
    /// custom or Jinja template or reserves the whole context window for generation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read chat settings from {}", path.display()))?;
        let settings = Self::from_json_str(&raw)
            .with_context(|| format!("invalid chat settings in {}", path.display()))?;
        debug!(
            path = %path.display(),
            template = %settings.template,
            budget = settings.token_budget(),
            "loaded chat settings"
        );
        Ok(settings)
    }

    /// Parses and validates settings from a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ChatSettings::load`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("malformed settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values the pipeline cannot work with.
    ///
    /// Unknown template labels are not an error; they are logged and the
    /// default template is used.
    ///
    /// # Errors
    ///
    /// Fails when `generation_reserve` leaves no room for the prompt.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.context_length > self.generation_reserve,
            "context_length ({}) must exceed generation_reserve ({})",
            self.context_length,
            self.generation_reserve
        );
        let user_template = self.custom_template.is_some() || self.jinja_template.is_some();
        if !user_template && self.template.parse::<TemplateId>().is_err() {
            warn!(
                template = %self.template,
                fallback = TemplateId::default().label(),
                "unknown template label in settings"
            );
        }
        Ok(())
    }
}
