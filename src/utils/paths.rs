// Path classification helpers

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use crate::utils::constants::{DEFAULT_SGREP_CONFIG_NAME, YML_EXTENSIONS};

/// True for `.yml` / `.yaml` files.
pub fn has_yaml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YML_EXTENSIONS.contains(&ext))
}

/// Every regular file below `root`, sorted. Symlinked directories are not entered.
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir() && entry.path().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Whether a config file sits below a hidden directory that should be ignored.
///
/// `rules/.sgrep.yml` and `src/.sgrep/bad_pattern.yml` are kept, while
/// `path/.github/foo.yml` is skipped. Only parent components are inspected.
pub fn is_hidden_config_dir(path: &Path) -> bool {
    let components: Vec<Component<'_>> = path.components().collect();
    let Some((_, parents)) = components.split_last() else {
        return false;
    };

    parents.iter().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') && !part.contains(DEFAULT_SGREP_CONFIG_NAME)
        }
        _ => false,
    })
}

fn test_file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(test_.*|.*_test\..*|.*\.test\..*|.*_spec\..*|.*\.spec\..*)$")
            .expect("static regex")
    })
}

const TEST_DIR_NAMES: &[&str] = &[
    "test", "tests", "__tests__", "spec", "specs", "doc", "docs", "example", "examples",
];

/// Heuristic used by `--exclude-tests`: tests, documentation and examples.
pub fn is_test_path(path: &Path) -> bool {
    let components: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
            _ => None,
        })
        .collect();

    let Some((file_name, parents)) = components.split_last() else {
        return false;
    };

    parents.iter().any(|dir| TEST_DIR_NAMES.contains(&dir.as_str()))
        || test_file_name_regex().is_match(file_name)
}
