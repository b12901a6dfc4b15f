use super::apply::ApplyPlan;
use super::paths::RelPath;
use prettytable::{row, Table};

pub struct View {}

impl View {
    pub fn changed_paths(paths: &[String]) {
        let mut table = Table::new();

        table.add_row(row!["#", "PATH"]);
        for (i, path) in paths.iter().enumerate() {
            table.add_row(row![i + 1, path]);
        }
        table.printstd();
    }

    pub fn plan(plan: &ApplyPlan) {
        let mut table = Table::new();

        table.add_row(row!["ACTION", "WHEN", "PATH"]);
        let groups: [(&str, &str, &[RelPath]); 4] = [
            ("delete", "now", &plan.immediate_deletions),
            ("replace", "now", &plan.immediate),
            ("delete", "after exit", &plan.deferred_deletions),
            ("replace", "after exit", &plan.deferred),
        ];
        for (action, when, paths) in groups {
            for path in paths {
                table.add_row(row![action, when, path]);
            }
        }
        table.printstd();
    }

    pub fn digests(rows: &[(String, String)]) {
        let mut table = Table::new();

        table.add_row(row!["SHA-256", "FILE"]);
        for (digest, path) in rows {
            table.add_row(row![digest, path]);
        }
        table.printstd();
    }
}
