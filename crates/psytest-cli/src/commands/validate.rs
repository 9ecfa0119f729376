//! The `psytest validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(instruments_path: PathBuf) -> Result<()> {
    let definitions = if instruments_path.is_dir() {
        psytest_core::parser::load_instrument_directory(&instruments_path)?
    } else {
        vec![psytest_core::parser::parse_instrument(&instruments_path)?]
    };

    let mut total_warnings = 0;

    for def in &definitions {
        println!(
            "Instrument: {} v{} ({} questions, {} categories)",
            def.name,
            def.version,
            def.questions.len(),
            def.categories.len()
        );

        let warnings = psytest_core::parser::validate_instrument(def);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All instruments valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
