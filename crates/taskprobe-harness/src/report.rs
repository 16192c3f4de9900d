use crate::scenarios::ScenarioOutcome;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};

pub fn render_table(outcomes: &[ScenarioOutcome]) -> String {
    let header = ["Scenario", "Result", "Job", "Time", "Details"]
        .into_iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan));

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    for outcome in outcomes {
        let elapsed = format!("{:.1}s", outcome.elapsed.as_secs_f64());
        let row = match &outcome.result {
            Ok(verdict) => vec![
                Cell::new(outcome.name),
                Cell::new("PASS").fg(Color::Green),
                Cell::new(verdict.job_id.0.as_str()).fg(Color::Yellow),
                Cell::new(elapsed),
                Cell::new(&verdict.summary),
            ],
            Err(e) => vec![
                Cell::new(outcome.name),
                Cell::new(format!("FAIL ({})", e.kind())).fg(Color::Red),
                Cell::new("-"),
                Cell::new(elapsed),
                Cell::new(e.to_string()),
            ],
        };
        table.add_row(row);
    }
    table.to_string()
}

/// One-line tally, colored by whether anything failed.
pub fn render_summary(outcomes: &[ScenarioOutcome]) -> String {
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    let failed = outcomes.len() - passed;
    let line = format!("{} passed, {} failed", passed, failed);
    if failed == 0 {
        line.green().to_string()
    } else {
        line.red().to_string()
    }
}
