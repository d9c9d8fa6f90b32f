//! Status command implementation.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::manager::{DriftReport, DriftState};

/// Run the status command.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the manifest cannot be
/// read, or any entry has drifted.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    log.stage("Status");
    let report = setup.manager(log).status(&global.groups)?;
    for line in render(&report).lines() {
        log.info(line);
    }

    let drifted = report.entries.iter().filter(|e| e.state.is_drift()).count();
    if drifted > 0 {
        anyhow::bail!(
            "{drifted} entr{} drifted",
            if drifted == 1 { "y has" } else { "ies have" }
        );
    }
    Ok(())
}

/// One line per entry, then a tally.
#[must_use]
pub fn render(report: &DriftReport) -> String {
    if report.entries.is_empty() {
        return "no entries".to_string();
    }
    let mut out = String::new();
    for entry in &report.entries {
        let detail = entry
            .detail
            .as_ref()
            .map_or_else(String::new, |d| format!(" ({d})"));
        out.push_str(&format!("{:<16} {}{detail}\n", entry.state, entry.key));
    }
    let tally: Vec<String> = [
        DriftState::Clean,
        DriftState::Modified,
        DriftState::MetadataDiffers,
        DriftState::Missing,
        DriftState::BrokenLink,
        DriftState::Unlinked,
        DriftState::Untracked,
        DriftState::Orphaned,
        DriftState::Unreadable,
    ]
    .into_iter()
    .filter_map(|state| {
        let count = report.in_state(state).count();
        (count > 0).then(|| format!("{count} {state}"))
    })
    .collect();
    out.push_str(&tally.join(", "));
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::manager::DriftEntry;
    use crate::manifest::EntryKey;

    fn entry(relative: &str, state: DriftState, detail: Option<&str>) -> DriftEntry {
        DriftEntry {
            key: EntryKey::new("user_config", relative),
            state,
            detail: detail.map(String::from),
        }
    }

    #[test]
    fn render_lists_states_and_tally() {
        let report = DriftReport {
            entries: vec![
                entry("wezterm.lua", DriftState::Clean, None),
                entry(
                    "zsh",
                    DriftState::Modified,
                    Some("managed copy differs from the recorded digest"),
                ),
                entry(
                    "alacritty.toml",
                    DriftState::BrokenLink,
                    Some("dangling link to /tmp/x"),
                ),
                entry(
                    "git/config",
                    DriftState::MetadataDiffers,
                    Some("mode 0700, recorded 0644"),
                ),
                entry("nvim", DriftState::Untracked, None),
            ],
        };
        insta::assert_snapshot!(render(&report), @r"
        clean            user_config/wezterm.lua
        modified         user_config/zsh (managed copy differs from the recorded digest)
        broken-link      user_config/alacritty.toml (dangling link to /tmp/x)
        metadata-differs user_config/git/config (mode 0700, recorded 0644)
        untracked        user_config/nvim
        1 clean, 1 modified, 1 metadata-differs, 1 broken-link, 1 untracked
        ");
    }

    #[test]
    fn render_empty_report() {
        insta::assert_snapshot!(render(&DriftReport::default()), @"no entries");
    }
}
