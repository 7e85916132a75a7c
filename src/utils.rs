//! Utility functions for file naming and path manipulation

use crate::error::{Error, Result};
use crate::types::{Artifact, Edition};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Maximum length of a sanitized title, in characters
const MAX_TITLE_CHARS: usize = 150;

// Characters rejected by common file systems and cloud drives
static UNSAFE_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).ok());

static WHITESPACE_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Make a title safe to use as a file name
///
/// Path separators and other reserved characters become `-`, whitespace runs
/// collapse to one space, and leading/trailing dots and spaces are removed.
///
/// # Examples
///
/// ```
/// use edition_courier::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("MF 10/2026"), "MF 10-2026");
/// assert_eq!(sanitize_file_name("  What?  Now: "), "What- Now-");
/// ```
#[must_use]
pub fn sanitize_file_name(title: &str) -> String {
    let replaced = match UNSAFE_CHARS.as_ref() {
        Some(re) => re.replace_all(title, "-").into_owned(),
        None => title.to_string(),
    };
    let collapsed = match WHITESPACE_RUN.as_ref() {
        Some(re) => re.replace_all(&replaced, " ").into_owned(),
        None => replaced,
    };
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();

    if truncated.is_empty() {
        "edition".to_string()
    } else {
        truncated.trim_end().to_string()
    }
}

/// Drop-off file name: `"{YYYY-MM-DD} - {sanitized title}{extension}"`
///
/// The extension comes from the downloaded artifact.
#[must_use]
pub fn dropoff_file_name(edition: &Edition, artifact: &Artifact) -> String {
    format!(
        "{} - {}{}",
        edition.publication_date.format("%Y-%m-%d"),
        sanitize_file_name(&edition.title),
        artifact.extension()
    )
}

/// Join a configured destination onto `root`, refusing to escape it
///
/// Leading `/` in `destination` is treated as relative to `root`, so "/MF"
/// maps to `root/MF`. Any `..` component is rejected.
pub fn resolve_under_root(root: &Path, destination: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(destination).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::InvalidDocument(format!(
                    "destination '{}' escapes the drop-off root",
                    destination
                )));
            }
        }
    }
    Ok(resolved)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_file_name("MF 10/2026"), "MF 10-2026");
        assert_eq!(sanitize_file_name("A:B*C?"), "A-B-C-");
        assert_eq!(sanitize_file_name("tab\there"), "tab-here");
    }

    #[test]
    fn sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_file_name("  ..Hidden title.  "), "Hidden title");
        assert_eq!(sanitize_file_name("..."), "edition");
    }

    #[test]
    fn sanitize_truncates_long_titles() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_file_name(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn dropoff_file_name_uses_date_title_and_extension() {
        let edition = Edition {
            title: "MF 10/2026".to_string(),
            issue: "Issue 10/2026".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            source_ref: "r".to_string(),
        };
        let artifact = Artifact {
            file_name: "download.PDF".to_string(),
            content_type: None,
            data: vec![1],
        };
        assert_eq!(
            dropoff_file_name(&edition, &artifact),
            "2026-10-01 - MF 10-2026.PDF"
        );
    }

    #[test]
    fn dropoff_file_name_is_a_single_path_component() {
        let edition = Edition {
            title: "MF 10/2026".to_string(),
            issue: "Issue 10/2026".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            source_ref: "r".to_string(),
        };
        let artifact = Artifact {
            file_name: "a.d/x".to_string(),
            content_type: None,
            data: vec![1],
        };
        let name = dropoff_file_name(&edition, &artifact);
        assert_eq!(name, "2026-10-01 - MF 10-2026");
        assert_eq!(Path::new(&name).components().count(), 1);
    }

    #[test]
    fn resolve_under_root_keeps_paths_inside() {
        let root = Path::new("/srv/drop");
        assert_eq!(
            resolve_under_root(root, "/MF").unwrap(),
            PathBuf::from("/srv/drop/MF")
        );
        assert_eq!(
            resolve_under_root(root, "Bob/./Magazines").unwrap(),
            PathBuf::from("/srv/drop/Bob/Magazines")
        );
        assert!(resolve_under_root(root, "/MF/../../etc").is_err());
    }
}
