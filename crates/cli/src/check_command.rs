use anyhow::Result;

use {
    otis_config::{OtisConfig, Severity, validate},
    otis_tickets::ReferenceTexts,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(config: &OtisConfig) -> Result<()> {
    let result = validate(config);

    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let texts = ReferenceTexts::load(&config.references);
    let missing = texts.missing();
    for title in &missing {
        eprintln!(
            "  {BOLD}{YELLOW}warning{RESET} references: {title} is empty or missing in {}",
            config.references.dir.display()
        );
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning) + missing.len();

    if !result.diagnostics.is_empty() || !missing.is_empty() {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
