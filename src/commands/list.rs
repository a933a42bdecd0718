//! `list` command: print the check catalog.

use crate::engine::orchestrator::{create_all_checks, CheckPhase, RegisteredCheck};
use crate::CheckCategory;

/// Render the catalog grouped by category, in execution order
pub fn render_check_list() -> String {
    let checks = create_all_checks();
    let mut output = String::from("Available checks:\n");

    for category in CheckCategory::ALL {
        let in_category: Vec<&RegisteredCheck> =
            checks.iter().filter(|c| c.category == category).collect();
        if in_category.is_empty() {
            continue;
        }

        output.push('\n');
        output.push_str(&format!("{} CHECKS:\n", category.to_string().to_uppercase()));
        for check in in_category {
            let marker = if check.phase == CheckPhase::Teardown {
                " (always runs)"
            } else {
                ""
            };
            output.push_str(&format!("  {:<8} {}{}\n", check.id, check.name, marker));
        }
    }

    output.push_str("\nTEMPLATES CHECKS:\n");
    output.push_str("  TPL-NNN  One per YAML file, via `longhorn-probe templates <DIR>`\n");
    output
}
