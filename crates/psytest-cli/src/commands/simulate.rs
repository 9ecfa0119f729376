//! The `psytest simulate` command.
//!
//! Drives a synthetic cohort through assign -> start -> answer -> complete
//! and prints the resulting cohort aggregate. Useful for sanity-checking an
//! instrument definition before putting it in front of students.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use psytest_core::catalog::InstrumentCatalog;
use psytest_core::lifecycle::AssignmentEngine;
use psytest_core::model::AggregateProfile;
use psytest_store::MemoryStore;

pub async fn execute(
    instruments: PathBuf,
    instrument_type: Option<String>,
    students: usize,
    seed: u64,
) -> Result<()> {
    let definitions = if instruments.is_dir() {
        psytest_core::parser::load_instrument_directory(&instruments)?
    } else {
        vec![psytest_core::parser::parse_instrument(&instruments)?]
    };
    if definitions.is_empty() {
        bail!("no instrument definitions found in {}", instruments.display());
    }

    let instrument_type = match instrument_type {
        Some(t) => t,
        None => {
            if definitions.len() > 1 {
                let types: Vec<&str> = definitions.iter().map(|d| d.id.as_str()).collect();
                bail!(
                    "multiple instruments loaded ({}), pick one with --instrument-type",
                    types.join(", ")
                );
            }
            definitions[0].id.clone()
        }
    };

    let catalog = Arc::new(InstrumentCatalog::from_definitions(definitions));
    let instrument = catalog
        .latest(&instrument_type)
        .with_context(|| format!("unknown instrument type: {instrument_type}"))?;

    let engine = AssignmentEngine::new(Arc::clone(&catalog), Arc::new(MemoryStore::new()));
    let mut rng = StdRng::seed_from_u64(seed);

    let config = &instrument.config;
    let question_count = instrument.questions.len();
    let mut cohort = Vec::with_capacity(students);

    eprintln!(
        "Simulating {} students over '{}' v{} ({} questions)",
        students, instrument.id, instrument.version, question_count
    );

    for _ in 0..students {
        let student_id = Uuid::from_u128(rng.gen());
        cohort.push(student_id);

        let assignment = engine
            .assign(student_id, &instrument_type, "simulator")
            .await?;
        engine.start(assignment.id).await?;

        for index in 0..question_count {
            let value = rng.gen_range(config.scale_min..=config.scale_max);
            // Mostly deliberate answers, with the occasional rushed one.
            let time_spent_ms = if rng.gen_bool(0.1) && config.min_time_per_question_ms > 0 {
                rng.gen_range(0..config.min_time_per_question_ms)
            } else {
                rng.gen_range(config.min_time_per_question_ms..=config.min_time_per_question_ms + 10_000)
            };
            engine
                .submit_answer(assignment.id, index, value, time_spent_ms)
                .await?;
        }

        engine.complete(assignment.id).await?;
    }

    let profile = engine.aggregate(&cohort, &instrument_type).await?;
    print_profile(&profile);

    Ok(())
}

fn print_profile(profile: &AggregateProfile) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Category", "Mean", "Std Dev", "Low", "Medium", "High"]);

    for (category, stats) in &profile.per_category {
        table.add_row(vec![
            Cell::new(category),
            Cell::new(format!("{:.1}", stats.mean)),
            Cell::new(format!("{:.1}", stats.std_dev)),
            Cell::new(stats.distribution.low),
            Cell::new(stats.distribution.medium),
            Cell::new(stats.distribution.high),
        ]);
    }

    eprintln!("\n{table}");
    println!(
        "Completed: {} / {} students",
        profile.total_completed_tests, profile.total_students
    );
    println!("Most common style: {}", profile.most_common_style);
    println!("Diversity index: {:.1} / 10", profile.diversity_index);
    println!("Flagged results: {}", profile.flagged_results);
}
