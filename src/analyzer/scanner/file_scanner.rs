use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::CollectionConfig;
use crate::types::{DocError, Result};

/// One collected source file, path relative to the project root with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Produces the files a project is documented from
pub trait SourceCollector: Send + Sync {
    fn collect(&self, root: &Path) -> Result<Vec<SourceFile>>;
}

pub struct FileScanner {
    config: CollectionConfig,
}

impl FileScanner {
    pub fn new(config: CollectionConfig) -> Self {
        Self { config }
    }

    fn is_ignored_file(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.config.ignore_filenames.iter().any(|f| f == name)
            || self
                .config
                .ignore_extensions
                .iter()
                .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

impl SourceCollector for FileScanner {
    fn collect(&self, root: &Path) -> Result<Vec<SourceFile>> {
        if !root.is_dir() {
            return Err(DocError::NoSourceFiles(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let skip_dirs = self.config.skip_dirs.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .require_git(false)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| skip_dirs.iter().any(|d| d == name)))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.is_ignored_file(name) {
                continue;
            }

            match path.metadata() {
                Ok(meta) if meta.len() > self.config.max_file_size_bytes => {
                    debug!("Skipping large file: {} ({} bytes)", path.display(), meta.len());
                    continue;
                }
                Ok(_) => {}
                Err(_) => continue,
            }

            // Non-UTF-8 content is treated as binary
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(SourceFile {
                path: relative.join("/"),
                content,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        if files.len() > self.config.max_files {
            warn!(
                "Found {} files, keeping the first {}",
                files.len(),
                self.config.max_files
            );
            files.truncate(self.config.max_files);
        }

        debug!("Collected {} source files from {}", files.len(), root.display());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_collects_sources_and_skips_noise() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "app.py", "print('hi')\n");
        write(root, "src/lib/util.ts", "export const x = 1;\n");
        write(root, "node_modules/pkg/index.js", "module.exports = {};\n");
        write(root, "README.md", "# readme\n");
        write(root, "bundle.min.js", "var a=1;\n");
        write(root, "package-lock.json", "{}\n");
        write(root, "empty.py", "   \n");

        let files = FileScanner::new(CollectionConfig::default())
            .collect(root)
            .unwrap();
        assert_eq!(paths(&files), vec!["app.py", "src/lib/util.ts"]);
        assert_eq!(files[0].content, "print('hi')\n");
    }

    #[test]
    fn test_size_and_count_limits() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for i in 0..5 {
            write(root, &format!("m{}.py", i), "x = 1\n");
        }
        write(root, "big.py", &"x".repeat(2_000));

        let config = CollectionConfig {
            max_file_size_bytes: 1_000,
            max_files: 3,
            ..CollectionConfig::default()
        };
        let files = FileScanner::new(config).collect(root).unwrap();
        assert_eq!(paths(&files), vec!["m0.py", "m1.py", "m2.py"]);
    }

    #[test]
    fn test_gitignore_respected() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".gitignore", "generated/\n");
        write(root, "generated/out.py", "x = 1\n");
        write(root, "main.py", "x = 2\n");

        let files = FileScanner::new(CollectionConfig::default())
            .collect(root)
            .unwrap();
        assert!(paths(&files).contains(&"main.py"));
        assert!(!paths(&files).contains(&"generated/out.py"));
    }

    #[test]
    fn test_binary_content_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.dat"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        let files = FileScanner::new(CollectionConfig::default())
            .collect(dir.path())
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let scanner = FileScanner::new(CollectionConfig::default());
        assert!(scanner.collect(Path::new("/nonexistent/triadoc")).is_err());
    }
}
