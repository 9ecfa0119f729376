//! The `psytest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    std::fs::create_dir_all("instruments")?;
    let instrument_path = std::path::Path::new("instruments/csi.toml");
    if instrument_path.exists() {
        println!("instruments/csi.toml already exists, skipping.");
    } else {
        std::fs::write(instrument_path, SAMPLE_INSTRUMENT)?;
        println!("Created instruments/csi.toml");
    }

    if std::path::Path::new("roster.toml").exists() {
        println!("roster.toml already exists, skipping.");
    } else {
        std::fs::write("roster.toml", SAMPLE_ROSTER)?;
        println!("Created roster.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit instruments/csi.toml and roster.toml");
    println!("  2. Run: psytest validate --instruments instruments");
    println!("  3. Run: psytest serve --instruments instruments --roster roster.toml");

    Ok(())
}

const SAMPLE_INSTRUMENT: &str = r#"[instrument]
id = "csi"
version = 1
name = "Cognitive Style Inventory"
categories = ["analytic", "intuitive", "practical"]

[instrument.config]
min_questions = 6
time_limit_minutes = 30
min_time_per_question_ms = 1500
max_time_per_question_ms = 120000
max_attempts = 3
cooldown_hours = 24
fast_answer_threshold = 5
scale_min = 1
scale_max = 5
shuffle_questions = true

[[questions]]
id = "q1"
text = "I prefer to break problems into smaller steps before acting."
category = "analytic"
weight = 1.0
polarity = "positive"

[[questions]]
id = "q2"
text = "I often sense the right answer before I can explain it."
category = "intuitive"
weight = 1.0
polarity = "positive"

[[questions]]
id = "q3"
text = "I would rather try something out than plan it in detail."
category = "practical"
weight = 1.0
polarity = "positive"

[[questions]]
id = "q4"
text = "Detailed analysis slows me down more than it helps."
category = "analytic"
weight = 1.0
polarity = "negative"

[[questions]]
id = "q5"
text = "Hunches are usually unreliable guides for me."
category = "intuitive"
weight = 1.0
polarity = "negative"

[[questions]]
id = "q6"
text = "I learn best by doing rather than by reading."
category = "practical"
weight = 1.5
polarity = "positive"
"#;

const SAMPLE_ROSTER: &str = r#"# Cohort roster: cohort id -> student UUIDs
[cohorts]
"3A" = [
    "7f6c1d0a-8c2e-4b1f-9a3d-1c2e3f4a5b6c",
    "0b1c2d3e-4f5a-6b7c-8d9e-0f1a2b3c4d5e",
]
"#;
