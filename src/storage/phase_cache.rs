//! Phase Cache
//!
//! Layout under `<cache_root>/<project_id>/`:
//!
//! - `miner_output.json`: aggregated facts
//! - `navigation.json`: the Architect's tree
//! - `pages/<page-id>.json`: one file per written page
//!
//! A parseable artifact means the phase (or page) is done. There is no
//! staleness check; `clear` is the only way to force regeneration. Writes go
//! through a temp file and rename so an interrupted run never leaves a
//! half-written artifact behind.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::types::{DocError, MinerOutput, NavigationTree, PageContent, Result};

const MINER_FILE: &str = "miner_output.json";
const NAVIGATION_FILE: &str = "navigation.json";
const PAGES_DIR: &str = "pages";
const SIDEBAR_FILE: &str = "sidebar.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Miner,
    Architect,
    Scribe,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Miner => write!(f, "miner"),
            Phase::Architect => write!(f, "architect"),
            Phase::Scribe => write!(f, "scribe"),
        }
    }
}

impl FromStr for Phase {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "miner" | "mining" => Ok(Phase::Miner),
            "architect" | "planning" | "navigation" => Ok(Phase::Architect),
            "scribe" | "writing" | "pages" => Ok(Phase::Scribe),
            other => Err(DocError::Config(format!(
                "Unknown phase '{}'. Expected miner, architect or scribe",
                other
            ))),
        }
    }
}

/// What is on disk for one project
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStatus {
    pub project_id: String,
    pub miner_files: Option<usize>,
    pub miner_facts: Option<usize>,
    pub navigation_pages: Option<usize>,
    pub written_pages: usize,
}

pub struct PhaseCache {
    dir: PathBuf,
    project_id: String,
}

impl PhaseCache {
    pub fn new(cache_root: impl AsRef<Path>, project_id: &str) -> Self {
        Self {
            dir: cache_root.as_ref().join(project_id),
            project_id: project_id.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn miner_path(&self) -> PathBuf {
        self.dir.join(MINER_FILE)
    }

    fn navigation_path(&self) -> PathBuf {
        self.dir.join(NAVIGATION_FILE)
    }

    fn pages_dir(&self) -> PathBuf {
        self.dir.join(PAGES_DIR)
    }

    fn page_path(&self, page_id: &str) -> PathBuf {
        self.pages_dir().join(format!("{}.json", file_stem(page_id)))
    }

    // =========================================================================
    // Miner
    // =========================================================================

    pub async fn load_miner(&self) -> Result<Option<MinerOutput>> {
        read_json(&self.miner_path()).await
    }

    pub async fn save_miner(&self, output: &MinerOutput) -> Result<()> {
        write_atomic(&self.miner_path(), output).await?;
        info!(
            "Saved miner output ({} files, {} facts)",
            output.results.len(),
            output.total_facts()
        );
        Ok(())
    }

    // =========================================================================
    // Architect
    // =========================================================================

    pub async fn load_navigation(&self) -> Result<Option<NavigationTree>> {
        read_json(&self.navigation_path()).await
    }

    pub async fn save_navigation(&self, tree: &NavigationTree) -> Result<()> {
        write_atomic(&self.navigation_path(), tree).await
    }

    // =========================================================================
    // Scribe
    // =========================================================================

    /// A page counts as present only when its file parses
    pub async fn has_page(&self, page_id: &str) -> bool {
        matches!(self.load_page(page_id).await, Ok(Some(_)))
    }

    pub async fn load_page(&self, page_id: &str) -> Result<Option<PageContent>> {
        read_json(&self.page_path(page_id)).await
    }

    pub async fn save_page(&self, page: &PageContent) -> Result<()> {
        write_atomic(&self.page_path(&page.id), page).await
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove one phase's artifacts, or the whole project when `phase` is
    /// `None`. Returns the number of files removed.
    pub async fn clear(&self, phase: Option<Phase>) -> Result<usize> {
        let removed = match phase {
            Some(Phase::Miner) => remove_file(&self.miner_path()).await? as usize,
            Some(Phase::Architect) => remove_file(&self.navigation_path()).await? as usize,
            Some(Phase::Scribe) => remove_dir(&self.pages_dir()).await?,
            None => remove_dir(&self.dir).await?,
        };
        info!(
            "Cleared {} artifact(s) for '{}' ({})",
            removed,
            self.project_id,
            phase.map_or_else(|| "all phases".to_string(), |p| p.to_string())
        );
        Ok(removed)
    }

    pub async fn status(&self) -> Result<CacheStatus> {
        let miner = self.load_miner().await?;
        let navigation = self.load_navigation().await?;
        Ok(CacheStatus {
            project_id: self.project_id.clone(),
            miner_files: miner.as_ref().map(|m| m.results.len()),
            miner_facts: miner.as_ref().map(MinerOutput::total_facts),
            navigation_pages: navigation.as_ref().map(|n| n.pages().len()),
            written_pages: count_json(&self.pages_dir()).await?,
        })
    }

    /// Write `sidebar.json` plus every cached page into
    /// `<docs_root>/<project_id>/`. Returns the export directory.
    pub async fn export_docs(
        &self,
        docs_root: impl AsRef<Path>,
        tree: &NavigationTree,
    ) -> Result<PathBuf> {
        let out = docs_root.as_ref().join(&self.project_id);
        tokio::fs::create_dir_all(&out).await?;
        write_atomic(&out.join(SIDEBAR_FILE), tree).await?;

        let mut exported = 0;
        for node in tree.pages() {
            if let Some(page) = self.load_page(&node.id).await? {
                write_atomic(&out.join(format!("{}.json", file_stem(&page.id))), &page).await?;
                exported += 1;
            }
        }

        info!("Exported sidebar and {} page(s) to {}", exported, out.display());
        Ok(out)
    }
}

/// Page ids come from slugified labels, but a hand-edited navigation file
/// must still not escape the pages directory.
fn file_stem(page_id: &str) -> String {
    page_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// An artifact that does not parse is treated as missing; the phase that
/// owns it regenerates and rewrites it.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => {
                debug!("Loaded {}", path.display());
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Ignoring unreadable artifact {}: {}", path.display(), e);
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &content).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

async fn remove_file(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn count_json(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|e| e == "json") {
            count += 1;
        }
    }
    Ok(count)
}

async fn remove_dir(dir: &Path) -> Result<usize> {
    let count = count_files(dir).await?;
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(count),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

async fn count_files(dir: &Path) -> Result<usize> {
    let mut stack = vec![dir.to_path_buf()];
    let mut count = 0;
    while let Some(current) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                stack.push(entry.path());
            } else {
                count += 1;
            }
        }
    }
    Ok(count)
}
