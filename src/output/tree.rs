//! Tree view of an ancestry, root at the top.

use colored::Colorize;

use crate::types::ProcessRecord;

pub fn render(ancestry: &[ProcessRecord]) -> String {
    let last = ancestry.len().saturating_sub(1);
    let mut lines = Vec::with_capacity(ancestry.len());

    for (depth, rec) in ancestry.iter().enumerate() {
        let label = format!("{} (pid {})", rec.command, rec.pid);
        let label = if depth == last {
            label.bold().to_string()
        } else {
            label
        };

        if depth == 0 {
            lines.push(label);
        } else {
            lines.push(format!("{}└─ {}", "  ".repeat(depth), label));
        }
    }

    lines.join("\n")
}
