use std::fs;
use std::path::{Path, PathBuf};

use le_api::EXTENSIONS;
use walkdir::WalkDir;

use crate::error_map::{map_source_path, map_source_read, CliError};

#[derive(Debug)]
pub(crate) struct LoadedSource {
    pub(crate) path: PathBuf,
    pub(crate) text: String,
}

pub(crate) fn resolve_path(raw: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(raw);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir().map_err(map_source_path)?.join(path)
    };
    if !absolute.exists() {
        return Err(CliError::from_source(
            "CLI_SOURCE_NOT_FOUND",
            format!("Path does not exist: {}", absolute.display()),
        ));
    }
    Ok(absolute)
}

pub(crate) fn load_file(raw: &str) -> Result<LoadedSource, CliError> {
    let path = resolve_path(raw)?;
    if !path.is_file() {
        return Err(CliError::from_source(
            "CLI_SOURCE_NOT_FILE",
            format!("Not a file: {}", path.display()),
        ));
    }
    let text = fs::read_to_string(&path).map_err(map_source_read)?;
    Ok(LoadedSource { path, text })
}

pub(crate) fn load_files(raw: &[String]) -> Result<Vec<LoadedSource>, CliError> {
    raw.iter().map(|path| load_file(path)).collect()
}

fn has_script_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| EXTENSIONS.contains(&extension))
}

/// Every script file under `raw`, sorted by path.
pub(crate) fn load_scripts_dir(raw: &str) -> Result<Vec<LoadedSource>, CliError> {
    let root = resolve_path(raw)?;
    if !root.is_dir() {
        return Err(CliError::from_source(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", root.display()),
        ));
    }

    let mut paths = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_script_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    paths.sort();

    if paths.is_empty() {
        return Err(CliError::from_source(
            "CLI_SOURCE_EMPTY",
            format!("No .lisp/.lsp files under {}", root.display()),
        ));
    }

    paths
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).map_err(map_source_read)?;
            Ok(LoadedSource { path, text })
        })
        .collect()
}

#[cfg(test)]
mod source_loader_tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("le-cli-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn scripts_dir_is_sorted_and_filtered() {
        let dir = temp_dir("sorted");
        fs::create_dir_all(dir.join("nested")).expect("nested");
        fs::write(dir.join("b.lisp"), "2").expect("write");
        fs::write(dir.join("a.lsp"), "1").expect("write");
        fs::write(dir.join("nested").join("c.lisp"), "3").expect("write");
        fs::write(dir.join("notes.txt"), "skip").expect("write");

        let loaded = load_scripts_dir(dir.to_str().expect("utf8")).expect("load");
        let texts = loaded.iter().map(|source| source.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["1", "2", "3"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_and_missing_dirs_are_errors() {
        let dir = temp_dir("empty");
        let error = load_scripts_dir(dir.to_str().expect("utf8")).expect_err("empty");
        assert_eq!(error.code(), Some("CLI_SOURCE_EMPTY"));
        let error = load_scripts_dir("/definitely/not/here").expect_err("missing");
        assert_eq!(error.code(), Some("CLI_SOURCE_NOT_FOUND"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_file_rejects_directories() {
        let dir = temp_dir("notfile");
        let error = load_file(dir.to_str().expect("utf8")).expect_err("dir");
        assert_eq!(error.code(), Some("CLI_SOURCE_NOT_FILE"));
        let _ = fs::remove_dir_all(&dir);
    }
}
