use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, ResourceOutcome};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Status symbol for an apply result
pub fn symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created => "+",
        ApplyResult::Modified => "~",
        ApplyResult::Removed => "-",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

fn colored_symbol(result: &ApplyResult) -> ColoredString {
    let symbol = symbol(result);
    match result {
        ApplyResult::NoChange => symbol.dimmed(),
        ApplyResult::Created => symbol.green(),
        ApplyResult::Modified => symbol.yellow(),
        ApplyResult::Removed => symbol.red(),
        ApplyResult::Failed { .. } => symbol.red().bold(),
        ApplyResult::Skipped { .. } => symbol.dimmed(),
    }
}

/// One line per realized resource
pub fn outcome_line(outcome: &ResourceOutcome) -> String {
    let detail = match &outcome.result {
        ApplyResult::Failed { error } => format!(" {}", error.red()),
        ApplyResult::Skipped { reason } => format!(" {}", format!("({reason})").dimmed()),
        _ => String::new(),
    };
    format!(
        "  {} {} {}{}",
        colored_symbol(&outcome.result),
        outcome.label(),
        outcome.action.as_str().dimmed(),
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, ResourceKind};

    #[test]
    fn test_symbols_are_distinct_per_change() {
        assert_eq!(symbol(&ApplyResult::Created), "+");
        assert_eq!(symbol(&ApplyResult::Modified), "~");
        assert_eq!(symbol(&ApplyResult::Removed), "-");
        assert_eq!(symbol(&ApplyResult::NoChange), "○");
        assert_eq!(symbol(&ApplyResult::dry_run("install")), "⊘");
    }

    #[test]
    fn test_outcome_line_mentions_reason() {
        colored::control::set_override(false);
        let outcome = ResourceOutcome {
            kind: ResourceKind::Package,
            name: "httpd".into(),
            action: Action::Install,
            result: ApplyResult::Skipped {
                reason: "only_if guard not met".into(),
            },
        };
        assert_eq!(
            outcome_line(&outcome),
            "  ⊘ Package[httpd] install (only_if guard not met)"
        );
    }
}
