use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the debug snapshot directory: `<exe_dir>/logs/debug/`
pub fn get_debug_dir() -> PathBuf {
    get_logs_dir().join("debug")
}

/// Returns the config file path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Resolves a configured path. Absolute paths are kept, relative ones are
/// taken relative to `base`.
pub fn resolve_from(base: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Resolves a configured path against the executable directory.
pub fn resolve(configured: &str) -> PathBuf {
    resolve_from(get_exe_dir(), configured)
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_debug_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_joins_base() {
        let base = Path::new("base_dir");
        assert_eq!(resolve_from(base, "Maps"), base.join("Maps"));
    }

    #[test]
    fn test_resolve_absolute_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("tessdata");
        let resolved = resolve_from(Path::new("ignored"), absolute.to_str().unwrap());
        assert_eq!(resolved, absolute);
    }
}
