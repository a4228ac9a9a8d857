use std::path::PathBuf;

use dirs_next::home_dir;

/// Expands a leading `~` to the current user's home directory.
///
/// Both `~/` and the Windows `~\` separator are recognized. Paths without a
/// tilde prefix are returned trimmed but otherwise untouched, and a missing
/// home directory leaves the literal `~` in place.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::expand_tilde;
    use std::path::PathBuf;

    #[test]
    fn leaves_absolute_paths_alone() {
        assert_eq!(expand_tilde("  /etc/stepweave.json "), PathBuf::from("/etc/stepweave.json"));
    }

    #[test]
    fn expands_home_prefix() {
        let Some(home) = dirs_next::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde("~/plans/a.yaml"), home.join("plans/a.yaml"));
        assert_eq!(expand_tilde("~"), home);
    }
}
