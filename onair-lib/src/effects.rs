//! Effect catalogue: resolving operator effect names to files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// List the effect file names in `dir`, sorted.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn list_effects(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve `name` to the first effect file whose name contains it,
/// ignoring case.
///
/// # Errors
/// [`EngineError::EffectNotFound`] if nothing matches (or `name` is blank),
/// [`EngineError::EffectsUnavailable`] if `dir` cannot be listed.
pub fn find_effect(dir: &Path, name: &str) -> Result<PathBuf> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return Err(EngineError::EffectNotFound(name.to_string()));
    }

    let names = list_effects(dir).map_err(|source| EngineError::EffectsUnavailable {
        dir: dir.to_path_buf(),
        source,
    })?;

    names
        .iter()
        .find(|file| file.to_lowercase().contains(&wanted))
        .map(|file| dir.join(file))
        .ok_or(EngineError::EffectNotFound(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        for file in files {
            fs::write(dir.path().join(file), b"fx").expect("write effect");
        }
        fs::create_dir(dir.path().join("nested")).expect("nested dir");
        dir
    }

    #[test]
    fn lists_files_sorted_without_directories() {
        let dir = fx_dir(&["Boo! Sound Effect.mp3", "Applause Sound Effect.mp3"]);
        let names = list_effects(dir.path()).unwrap();
        assert_eq!(
            names,
            vec!["Applause Sound Effect.mp3", "Boo! Sound Effect.mp3"]
        );
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let dir = fx_dir(&["Applause Sound Effect.mp3", "Fart - Gaming Sound Effect.mp3"]);
        let found = find_effect(dir.path(), "APPLAUSE").unwrap();
        assert_eq!(found, dir.path().join("Applause Sound Effect.mp3"));
    }

    #[test]
    fn first_sorted_match_wins() {
        let dir = fx_dir(&["laugh b.mp3", "laugh a.mp3"]);
        let found = find_effect(dir.path(), "laugh").unwrap();
        assert_eq!(found, dir.path().join("laugh a.mp3"));
    }

    #[test]
    fn unknown_or_blank_names_are_not_found() {
        let dir = fx_dir(&["Applause Sound Effect.mp3"]);
        assert!(matches!(
            find_effect(dir.path(), "trumpet"),
            Err(EngineError::EffectNotFound(name)) if name == "trumpet"
        ));
        assert!(matches!(
            find_effect(dir.path(), "   "),
            Err(EngineError::EffectNotFound(_))
        ));
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(
            find_effect(&missing, "applause"),
            Err(EngineError::EffectsUnavailable { .. })
        ));
    }
}
