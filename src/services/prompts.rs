//! Prompt template store.
//!
//! The YAML document is parsed once at startup into an immutable [`PromptSet`].
//! Templates are tera templates (`{{ name }}`). Each one is test-rendered at load
//! with exactly the variables it will receive, so a typo in the document fails at
//! startup instead of at request time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tera::{Context, Tera};

use crate::models::BookingField;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompts file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read prompts file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed prompts document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("template {key}: {message}")]
    Template { key: &'static str, message: String },
}

impl PromptError {
    fn template(key: &'static str, err: &tera::Error) -> Self {
        // tera keeps the useful part (which variable, which line) in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        PromptError::Template { key, message }
    }
}

/// Compiled templates of one document section, keyed by logical name.
#[derive(Debug, Clone, Default)]
struct Templates(Tera);

impl Templates {
    fn add(&mut self, key: &'static str, source: &str, vars: &[&str]) -> Result<(), PromptError> {
        self.0
            .add_raw_template(key, source)
            .map_err(|e| PromptError::template(key, &e))?;

        let blank: Vec<(&str, &str)> = vars.iter().map(|v| (*v, "")).collect();
        self.render(key, &blank).map(|_| ())
    }

    fn render(&self, key: &'static str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut context = Context::new();
        for (name, value) in vars {
            context.insert(*name, value);
        }
        self.0
            .render(key, &context)
            .map(|text| text.trim().to_string())
            .map_err(|e| PromptError::template(key, &e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionPrompts {
    pub required_fields: Vec<BookingField>,
    #[serde(default)]
    pub field_questions: HashMap<BookingField, String>,
    pub clarification_joiner: String,
    pub max_clarification_fields: usize,
    pub existing_context_prefix: String,
    system: String,
    user: String,
    #[serde(skip)]
    templates: Templates,
}

impl ExtractionPrompts {
    const SYSTEM: &'static str = "extraction.system";
    const USER: &'static str = "extraction.user";

    pub fn system(&self, today: &str) -> Result<String, PromptError> {
        self.templates.render(Self::SYSTEM, &[("today", today)])
    }

    pub fn user(&self, transcript: &str, existing_context: &str) -> Result<String, PromptError> {
        self.templates.render(
            Self::USER,
            &[("transcript", transcript), ("existing_context", existing_context)],
        )
    }

    pub fn question(&self, field: BookingField) -> Option<&str> {
        self.field_questions.get(&field).map(String::as_str)
    }

    fn compile(&mut self) -> Result<(), PromptError> {
        self.templates.add(Self::SYSTEM, &self.system, &["today"])?;
        self.templates
            .add(Self::USER, &self.user, &["transcript", "existing_context"])?;

        for (i, field) in self.required_fields.iter().enumerate() {
            if self.required_fields[..i].contains(field) {
                return Err(PromptError::Template {
                    key: "extraction.required_fields",
                    message: format!("{} listed more than once", field.as_str()),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionPrompts {
    select_system: String,
    select_user: String,
    confirm_system: String,
    confirm_user: String,
    #[serde(skip)]
    templates: Templates,
}

impl SelectionPrompts {
    const SELECT_SYSTEM: &'static str = "selection.select_system";
    const SELECT_USER: &'static str = "selection.select_user";
    const CONFIRM_SYSTEM: &'static str = "selection.confirm_system";
    const CONFIRM_USER: &'static str = "selection.confirm_user";

    pub fn select_system(&self, provider_list: &str) -> Result<String, PromptError> {
        self.templates
            .render(Self::SELECT_SYSTEM, &[("provider_list", provider_list)])
    }

    pub fn select_user(&self, transcript: &str) -> Result<String, PromptError> {
        self.templates.render(Self::SELECT_USER, &[("transcript", transcript)])
    }

    pub fn confirm_system(&self) -> Result<String, PromptError> {
        self.templates.render(Self::CONFIRM_SYSTEM, &[])
    }

    pub fn confirm_user(&self, transcript: &str) -> Result<String, PromptError> {
        self.templates.render(Self::CONFIRM_USER, &[("transcript", transcript)])
    }

    fn compile(&mut self) -> Result<(), PromptError> {
        self.templates
            .add(Self::SELECT_SYSTEM, &self.select_system, &["provider_list"])?;
        self.templates
            .add(Self::SELECT_USER, &self.select_user, &["transcript"])?;
        self.templates
            .add(Self::CONFIRM_SYSTEM, &self.confirm_system, &[])?;
        self.templates
            .add(Self::CONFIRM_USER, &self.confirm_user, &["transcript"])?;
        Ok(())
    }
}

/// All prompt text used by the engines.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    pub extraction: ExtractionPrompts,
    pub selection: SelectionPrompts,
}

impl PromptSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PromptError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PromptError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let prompts = Self::from_yaml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            required_fields = prompts.extraction.required_fields.len(),
            "loaded prompt templates"
        );
        Ok(prompts)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, PromptError> {
        let mut prompts: PromptSet = serde_yaml::from_str(raw)?;
        prompts.extraction.compile()?;
        prompts.selection.compile()?;
        Ok(prompts)
    }
}
