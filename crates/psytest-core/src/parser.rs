//! TOML instrument definition parser.
//!
//! Loads instrument catalogs from TOML files and directories, and validates
//! them for common authoring mistakes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{InstrumentConfig, InstrumentDefinition, Polarity, Question};

/// Intermediate TOML structure for parsing instrument files.
#[derive(Debug, Deserialize)]
struct TomlInstrumentFile {
    instrument: TomlInstrumentHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlInstrumentHeader {
    id: String,
    #[serde(default = "default_version")]
    version: u32,
    name: String,
    categories: Vec<String>,
    #[serde(default)]
    config: InstrumentConfig,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    text: String,
    category: String,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    polarity: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// Parse a single TOML file into an `InstrumentDefinition`.
pub fn parse_instrument(path: &Path) -> Result<InstrumentDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read instrument file: {}", path.display()))?;

    parse_instrument_str(&content, path)
}

/// Parse a TOML string into an `InstrumentDefinition` (useful for testing).
pub fn parse_instrument_str(content: &str, source_path: &Path) -> Result<InstrumentDefinition> {
    let parsed: TomlInstrumentFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    if parsed.questions.is_empty() {
        anyhow::bail!(
            "instrument '{}' declares no questions: {}",
            parsed.instrument.id,
            source_path.display()
        );
    }

    let config = parsed.instrument.config;
    if config.scale_min >= config.scale_max {
        anyhow::bail!(
            "invalid ordinal scale {}..={} in instrument '{}'",
            config.scale_min,
            config.scale_max,
            parsed.instrument.id
        );
    }

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| {
            if !parsed.instrument.categories.contains(&q.category) {
                anyhow::bail!(
                    "question '{}' references undeclared category '{}'",
                    q.id,
                    q.category
                );
            }
            let polarity = q
                .polarity
                .map(|p| p.parse::<Polarity>().map_err(|e| anyhow::anyhow!("{}", e)))
                .transpose()?
                .unwrap_or(Polarity::Positive);

            Ok(Question {
                id: q.id,
                text: q.text,
                category: q.category,
                weight: q.weight,
                polarity,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(InstrumentDefinition {
        id: parsed.instrument.id,
        version: parsed.instrument.version,
        name: parsed.instrument.name,
        categories: parsed.instrument.categories,
        questions,
        config,
    })
}

/// Recursively load all `.toml` instrument files from a directory.
pub fn load_instrument_directory(dir: &Path) -> Result<Vec<InstrumentDefinition>> {
    let mut definitions = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            definitions.extend(load_instrument_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_instrument(&path) {
                Ok(def) => definitions.push(def),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(definitions)
}

/// A warning from instrument validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an instrument definition for common issues.
pub fn validate_instrument(def: &InstrumentDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Duplicate question IDs
    let mut seen_ids = std::collections::HashSet::new();
    for q in &def.questions {
        if !seen_ids.insert(&q.id) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    // Weights outside the (0, 10] invariant
    for q in &def.questions {
        if q.weight <= 0.0 || q.weight > 10.0 {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("weight {} outside (0, 10]", q.weight),
            });
        }
    }

    // Diversity index needs at least 2 categories to be meaningful
    if def.categories.len() < 2 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "fewer than 2 categories; diversity index will always be 0".into(),
        });
    }

    // Categories declared but never used
    for c in &def.categories {
        if !def.questions.iter().any(|q| &q.category == c) {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!("category '{c}' has no questions"),
            });
        }
    }

    if def.config.min_questions > def.questions.len() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "min_questions {} exceeds question count {}; attempts can never complete",
                def.config.min_questions,
                def.questions.len()
            ),
        });
    }

    if def.config.min_questions == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "min_questions is 0; empty attempts would be completable".into(),
        });
    }

    warnings
}
