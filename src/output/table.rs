use comfy_table::{presets, Cell, Color, Table};

use crate::types::Candidate;

/// Indexed listing of the processes an ambiguous name matched.
pub fn candidates(candidates: &[Candidate]) -> String {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["#", "PID", "COMMAND"]);

    for (i, c) in candidates.iter().enumerate() {
        table.add_row(vec![
            Cell::new(format!("[{}]", i + 1)),
            Cell::new(c.pid).fg(Color::Yellow),
            Cell::new(&c.cmdline),
        ]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_listing() {
        let out = candidates(&[
            Candidate {
                pid: 100,
                cmdline: "node api.js".into(),
            },
            Candidate {
                pid: 200,
                cmdline: "node web.js".into(),
            },
        ]);
        assert!(out.contains("[1]"));
        assert!(out.contains("[2]"));
        assert!(out.contains("100"));
        assert!(out.contains("node web.js"));
    }
}
