//! Recorder file discovery

use crate::error::Result;
use crate::reader::ChannelReader;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::stack::sort_by_start_time;

/// Match `name` against a pattern with `*` and `?` wildcards
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            // Let the last star swallow one more character
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Find files with `extension` in `directory`
///
/// `file_name` is a stem pattern with `*`/`?` wildcards (`None` matches
/// everything). An empty extension accepts every file. The result is sorted
/// by path.
pub fn discover_files(
    directory: &Path,
    extension: &str,
    file_name: Option<&str>,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut found = Vec::new();
    collect(directory, extension, file_name.unwrap_or("*"), recursive, &mut found)?;
    found.sort();
    tracing::debug!("Found {} files in {}", found.len(), directory.display());
    Ok(found)
}

fn collect(
    directory: &Path,
    extension: &str,
    stem_pattern: &str,
    recursive: bool,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    let mut walker = WalkDir::new(directory).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // The search root itself must be readable
            Err(e) if e.depth() == 0 => return Err(io::Error::from(e).into()),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry below {}: {}", directory.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext_ok = extension.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        let stem_ok = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| wildcard_match(stem_pattern, s));

        if ext_ok && stem_ok {
            found.push(entry.into_path());
        }
    }
    Ok(())
}

/// Discover recorder files and order them by start time
pub fn sorted_files(
    reader: &mut dyn ChannelReader,
    directory: &Path,
    extension: &str,
    file_name: Option<&str>,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let files = discover_files(directory, extension, file_name, recursive)?;
    Ok(sort_by_start_time(reader, &files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryReader;

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("line?_*", "line2_20240301"));
        assert!(!wildcard_match("line?_*", "line_20240301"));
        assert!(wildcard_match("*.part", "a.b.part"));
        assert!(!wildcard_match("abc", "abcd"));
        assert!(wildcard_match("", ""));
    }

    #[test]
    fn test_discovery_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        for name in ["a.dat", "b.DAT", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::write(sub.join("c.dat"), b"").unwrap();

        let flat = discover_files(dir.path(), ".dat", None, false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.dat"), dir.path().join("b.DAT")]);

        let deep = discover_files(dir.path(), "dat", None, true).unwrap();
        assert_eq!(deep.len(), 3);

        let named = discover_files(dir.path(), "dat", Some("c*"), true).unwrap();
        assert_eq!(named, vec![sub.join("c.dat")]);

        let everything = discover_files(dir.path(), "", None, false).unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn test_sorted_files_by_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.dat"), b"starttime:02.01.2024 00:00:00\n").unwrap();
        std::fs::write(dir.path().join("b.dat"), b"starttime:01.01.2024 00:00:00\n").unwrap();

        let mut reader = MemoryReader::new();
        let files = sorted_files(&mut reader, dir.path(), "dat", None, false).unwrap();
        assert_eq!(files, vec![dir.path().join("b.dat"), dir.path().join("a.dat")]);
    }

    #[test]
    fn test_flat_search_ignores_nested_matches() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2024").join("05");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("deep.dat"), b"").unwrap();
        std::fs::write(dir.path().join("top.dat"), b"").unwrap();
        // A directory named like a recorder file is not a file
        std::fs::create_dir(dir.path().join("folder.dat")).unwrap();

        let flat = discover_files(dir.path(), "dat", None, false).unwrap();
        assert_eq!(flat, vec![dir.path().join("top.dat")]);

        let deep = discover_files(dir.path(), "dat", None, true).unwrap();
        assert_eq!(deep, vec![nested.join("deep.dat"), dir.path().join("top.dat")]);
    }

    #[test]
    fn test_missing_directory() {
        assert!(discover_files(Path::new("/nonexistent/recordings"), "dat", None, false).is_err());
    }
}
