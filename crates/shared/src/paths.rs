//! File path utilities for the explorer's data directory.

use std::path::{Path, PathBuf};

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Create a new DataPaths with the given root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Logs ==========

    /// Get logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ========== Exports ==========

    /// Directory that favorites exports are written to
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Path of a favorites export file
    pub fn favorites_export(&self, name: &str) -> PathBuf {
        self.exports_dir()
            .join(format!("{}.json", Self::title_to_slug(name)))
    }

    // ========== Utility Methods ==========

    /// Create all necessary directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        let dirs = vec![self.root.clone(), self.logs_dir(), self.exports_dir()];

        for dir in dirs {
            std::fs::create_dir_all(&dir)?;
        }

        Ok(())
    }

    /// Create a filename slug from a free-form title
    pub fn title_to_slug(title: &str) -> String {
        let slug = title
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();

        if slug.is_empty() {
            "favorites".to_string()
        } else {
            slug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let paths = DataPaths::new("/data");

        assert_eq!(paths.logs_dir(), PathBuf::from("/data/logs"));
        assert_eq!(
            paths.favorites_export("My Favorites"),
            PathBuf::from("/data/exports/my_favorites.json")
        );
    }

    #[test]
    fn test_title_slug() {
        assert_eq!(
            DataPaths::title_to_slug("Fullmetal Alchemist: Brotherhood"),
            "fullmetal_alchemist_brotherhood"
        );
        assert_eq!(DataPaths::title_to_slug("鋼の錬金術師"), "favorites");
    }

    #[test]
    fn test_create_dirs() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path().join("data"));
        paths.create_dirs()?;

        assert!(paths.logs_dir().is_dir());
        assert!(paths.exports_dir().is_dir());
        Ok(())
    }
}
