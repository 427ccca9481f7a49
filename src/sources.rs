use crate::t_args;
use crate::transcript::{Prompts, parse};
use crate::types::{LoadFailure, Session, SourceTag};
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct Loaded {
    pub sessions: Vec<Session>,
    pub failures: Vec<LoadFailure>,
    /// Files without any statement, when those are skipped.
    pub skipped: Vec<PathBuf>,
}

fn has_extension(path: &std::path::Path, extensions: &[String]) -> bool {
    path.extension()
        .is_some_and(|ext| extensions.iter().any(|e| ext == e.as_str()))
}

/// Files named on the command line, plus matching files below named directories.
/// Directory entries that cannot be read become load failures.
pub fn collect_files(paths: &[PathBuf], extensions: &[String]) -> (Vec<PathBuf>, Vec<LoadFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for p in paths {
        if !p.is_dir() {
            files.push(p.clone());
            continue;
        }
        for entry in WalkDir::new(p).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    let file = e.path().map(|f| f.to_path_buf()).unwrap_or_else(|| p.clone());
                    failures.push(LoadFailure {
                        message: t_args!("load-cannot-read", "file" => file.display(), "error" => e),
                        file,
                    });
                }
            }
        }
    }
    (files, failures)
}

/// Reads and parses every session file. Unreadable files and files without
/// statements become load failures; with `skip_empty` the latter are skipped.
pub fn load_sessions(
    paths: &[PathBuf],
    extensions: &[String],
    prompts: &Prompts,
    skip_empty: bool,
) -> Loaded {
    let (files, failures) = collect_files(paths, extensions);
    let mut loaded = Loaded {
        failures,
        ..Loaded::default()
    };
    for file in files {
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) => {
                loaded.failures.push(LoadFailure {
                    message: t_args!("load-cannot-read", "file" => file.display(), "error" => e),
                    file,
                });
                continue;
            }
        };
        match parse(&text, prompts, SourceTag::new(&file, 1)) {
            Ok(session) => loaded.sessions.push(session),
            Err(_) if skip_empty => {
                debug!("{}", t_args!("debug-skipped-empty", "file" => file.display()));
                loaded.skipped.push(file);
            }
            Err(e) => loaded.failures.push(LoadFailure {
                message: e.to_string(),
                file,
            }),
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn js() -> Vec<String> {
        vec!["js".to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_a_load_failure() -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.js"), "js> 1\n1\n")?;
        let locked = dir.path().join("locked");
        fs::create_dir(&locked)?;
        fs::write(locked.join("b.js"), "js> 2\n2\n")?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        // root reads anything; nothing to check then
        let readable = fs::read_dir(&locked).is_ok();

        let loaded = load_sessions(&[dir.path().to_path_buf()], &js(), &Prompts::default(), false);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        assert_eq!(loaded.sessions.len(), if readable { 2 } else { 1 });
        if !readable {
            assert_eq!(loaded.failures.len(), 1);
            assert_eq!(loaded.failures[0].file, locked);
        }
        Ok(())
    }

    #[test]
    fn named_files_skip_the_extension_filter() {
        let (files, failures) = collect_files(&[PathBuf::from("notes.txt")], &js());
        assert_eq!(files, vec![PathBuf::from("notes.txt")]);
        assert!(failures.is_empty());
    }
}
