use serde::Serialize;
use stagehand_core::ExecutionResult;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Left-aligned columns two spaces apart. Widths count characters, and the
/// last column is left unpadded.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .fold(header.chars().count(), usize::max)
        })
        .collect();

    println!("{}", render_row(headers, &widths));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", render_row(&rule, &widths));
    for row in &rows {
        println!("{}", render_row(row, &widths));
    }
}

fn render_row<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let mut line = String::new();
    for (col, cell) in cells.iter().enumerate() {
        let cell = cell.as_ref();
        if col > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        if col + 1 < cells.len() {
            let pad = widths.get(col).copied().unwrap_or(0);
            line.push_str(&" ".repeat(pad.saturating_sub(cell.chars().count())));
        }
    }
    line
}

/// One-line human summary of an action outcome, followed by any captured
/// output and per-step sequence lines.
pub fn print_result(label: &str, result: &ExecutionResult) {
    if result.success {
        println!("ok      {label} ({}ms)", result.duration_ms);
    } else {
        let status = if result.timed_out { "timeout" } else { "failed" };
        println!(
            "{status:<7} {label}: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(report) = &result.sequence {
        for (i, step) in report.steps.iter().enumerate() {
            let detail = step
                .error
                .as_deref()
                .or(step.target.as_deref())
                .unwrap_or("");
            println!("  {:>2}. {:<16} {:<11} {detail}", i + 1, step.action_type, step.status.to_string());
        }
    }
    if let Some(output) = result.output.as_deref().filter(|o| !o.trim().is_empty()) {
        for line in output.lines() {
            println!("  | {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_every_column_but_the_last() {
        let widths = [4, 6, 3];
        assert_eq!(render_row(&["ab", "cdef", "g"], &widths), "ab    cdef    g");
        assert_eq!(render_row(&["TYPE", "TRUST"], &widths), "TYPE  TRUST");
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        assert_eq!(render_row(&["é", "x"], &[2, 1]), "é   x");
    }
}
