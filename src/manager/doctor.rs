//! `doctor`: read-only consistency sweep.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::{DriftState, Issue, Manager, Severity};
use crate::error::DotbakError;
use crate::resources::EntryKind;
use crate::resources::health::{is_writable, untracked_in_tree};

const RERUN_APPLY: &str = "run `dotbak apply` to link it again";
const RERUN_ELEVATED: &str = "re-run with elevated privileges";

impl Manager<'_> {
    /// Look for anything that would make the next command fail or lose
    /// track of data.  An empty result means the tree is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown group, an unreadable manifest, or a
    /// managed tree that cannot be walked.
    pub fn doctor(&self, groups: &[String]) -> Result<Vec<Issue>, DotbakError> {
        let selected = self.select(groups)?;
        let manifest = self.load_manifest()?;
        let root = &self.config.settings.managed_root;
        let mut issues = Vec::new();
        let tracked: BTreeSet<PathBuf> = manifest
            .iter()
            .map(|(_, record)| record.managed_path.clone())
            .collect();

        for group in &selected {
            for entry in group.entries(root) {
                let subject = entry.key.to_string();
                let (state, detail) = self.classify(&entry, &manifest);
                if let Some(issue) = drift_issue(&subject, state, detail.as_deref()) {
                    issues.push(issue);
                }
                if manifest.get(&entry.key).is_some()
                    && !is_writable(&entry.source, self.platform)?
                {
                    issues.push(
                        Issue::new(
                            Severity::Error,
                            subject,
                            format!(
                                "{} is not writable by the current user",
                                entry.source.display()
                            ),
                        )
                        .with_guidance(RERUN_ELEVATED),
                    );
                }
            }
        }

        for key in self.stale_keys(&manifest, groups) {
            let Some(record) = manifest.get(&key) else {
                continue;
            };
            let issue = if EntryKind::detect(&record.managed_path)?.is_some() {
                Issue::new(
                    Severity::Warning,
                    key.to_string(),
                    "recorded but no longer configured",
                )
                .with_guidance("add it back to the configuration or delete the managed copy")
            } else {
                Issue::new(
                    Severity::Error,
                    key.to_string(),
                    format!(
                        "orphaned record: managed copy {} is missing",
                        record.managed_path.display()
                    ),
                )
                .with_guidance("remove the record by running `dotbak apply`")
            };
            issues.push(issue);
        }

        let manifest_path = self.config.settings.manifest_path.as_path();
        let roots: Vec<PathBuf> = if groups.is_empty() {
            vec![root.clone()]
        } else {
            selected.iter().map(|g| root.join(&g.name)).collect()
        };
        for walk_root in &roots {
            for path in untracked_in_tree(walk_root, &tracked, &[manifest_path])? {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        display_under(&path, root),
                        "untracked-in-tree: present in the managed tree but not in the manifest",
                    )
                    .with_guidance("add it to the configuration or delete it"),
                );
            }
        }

        Ok(issues)
    }
}

fn drift_issue(subject: &str, state: DriftState, detail: Option<&str>) -> Option<Issue> {
    let describe = |fallback: &str| detail.unwrap_or(fallback).to_string();
    let issue = match state {
        DriftState::Clean | DriftState::Untracked | DriftState::Orphaned => return None,
        DriftState::Modified => Issue::new(Severity::Warning, subject, describe("modified"))
            .with_guidance("run `dotbak apply` to record the new content"),
        DriftState::MetadataDiffers => Issue::new(
            Severity::Warning,
            subject,
            format!("metadata differs: {}", describe("metadata changed")),
        )
        .with_guidance("run `dotbak apply` to re-apply the recorded metadata"),
        DriftState::Unlinked => {
            Issue::new(Severity::Warning, subject, describe("not linked")).with_guidance(RERUN_APPLY)
        }
        DriftState::BrokenLink => Issue::new(
            Severity::Error,
            subject,
            format!("broken link: {}", describe("wrong target")),
        )
        .with_guidance(format!("remove the link and {RERUN_APPLY}")),
        DriftState::Missing => Issue::new(Severity::Error, subject, describe("missing"))
            .with_guidance("restore the file or remove the entry from the configuration"),
        DriftState::Unreadable => {
            Issue::new(Severity::Error, subject, describe("cannot be inspected"))
        }
    };
    Some(issue)
}

fn display_under(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).map_or_else(
        |_| path.display().to_string(),
        |relative| relative.display().to_string(),
    )
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::os::unix::fs::PermissionsExt as _;

    use super::*;
    use crate::manager::testing::Fixture;

    fn applied() -> Fixture {
        let fx = Fixture::new(&["zsh", "wezterm.lua"]);
        fx.write_source("zsh/.zshrc", "setopt autocd\n");
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        fx
    }

    #[test]
    fn healthy_tree_has_no_issues() {
        let fx = applied();
        assert!(fx.manager().doctor(&[]).unwrap().is_empty());
    }

    #[test]
    fn dangling_link_is_an_error() {
        let fx = applied();
        std::fs::remove_file(fx.source("wezterm.lua")).unwrap();
        std::os::unix::fs::symlink(fx.dir.path().join("nowhere"), fx.source("wezterm.lua"))
            .unwrap();

        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].cause.starts_with("broken link: dangling link to"));
    }

    #[test]
    fn untracked_files_in_tree_are_reported() {
        let fx = applied();
        std::fs::write(fx.managed("stray.conf"), "x").unwrap();

        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject, "user_config/stray.conf");
        assert!(issues[0].cause.starts_with("untracked-in-tree"));
    }

    #[test]
    fn configured_copy_without_record_is_untracked() {
        let fx = Fixture::new(&["zsh", "wezterm.lua"]);
        fx.write_source("wezterm.lua", "return {}\n");
        fx.manager().sync(&[]).unwrap();
        // Configured, never applied, yet something sits at its managed path.
        std::fs::create_dir_all(fx.managed("zsh")).unwrap();
        std::fs::write(fx.managed("zsh/.zshrc"), "leftover\n").unwrap();

        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject, "user_config/zsh");
        assert!(issues[0].cause.starts_with("untracked-in-tree"));
    }

    #[test]
    fn changed_mode_is_a_warning() {
        let fx = applied();
        std::fs::set_permissions(
            fx.managed("wezterm.lua"),
            std::fs::Permissions::from_mode(0o700),
        )
        .unwrap();

        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].cause.starts_with("metadata differs: mode 0700"));
    }

    #[test]
    fn relative_link_entry_with_deleted_target_is_an_error() {
        let fx = Fixture::new(&["theme"]);
        fx.write_source("themes/dark.toml", "bg = \"#000\"\n");
        std::os::unix::fs::symlink("themes/dark.toml", fx.source("theme")).unwrap();
        fx.manager().sync(&[]).unwrap();
        assert!(fx.manager().doctor(&[]).unwrap().is_empty());

        std::fs::remove_file(fx.source("themes/dark.toml")).unwrap();
        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].cause.starts_with("broken link: dangling link to"));
    }

    #[test]
    fn orphaned_record_without_copy_is_an_error() {
        let fx = applied();
        let mut manifest = crate::manifest::Manifest::load(fx.manifest_path())
            .unwrap()
            .unwrap();
        let key = crate::manifest::EntryKey::new("user_config", "wezterm.lua");
        let mut record = manifest.get(&key).unwrap().clone();
        record.managed_path = fx.managed("gone.lua");
        manifest.upsert(
            crate::manifest::EntryKey::new("user_config", "gone.lua"),
            record,
        );
        manifest.save(fx.manifest_path()).unwrap();

        let issues = fx.manager().doctor(&[]).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject, "user_config/gone.lua");
        assert!(issues[0].cause.starts_with("orphaned record"));
    }

    #[test]
    fn unwritable_destination_is_flagged_with_guidance() {
        let fx = applied();
        if fx.platform.is_privileged() {
            return;
        }
        let base = fx.base();
        std::fs::set_permissions(&base, std::fs::Permissions::from_mode(0o555)).unwrap();
        let issues = fx.manager().doctor(&[]);
        std::fs::set_permissions(&base, std::fs::Permissions::from_mode(0o755)).unwrap();

        let issues = issues.unwrap();
        assert_eq!(issues.len(), 2);
        assert!(
            issues
                .iter()
                .all(|i| i.guidance.as_deref() == Some(RERUN_ELEVATED))
        );
    }

    #[test]
    fn doctor_is_read_only() {
        let fx = applied();
        std::fs::write(fx.managed("stray.conf"), "x").unwrap();
        let before = std::fs::read_to_string(fx.manifest_path()).unwrap();
        fx.manager().doctor(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(fx.manifest_path()).unwrap(), before);
        assert!(fx.managed("stray.conf").exists());
    }
}
