//! Page-to-Module Resolution
//!
//! Decides which mined modules feed a page. A module matches when every
//! keyword of the page id, or every keyword of its title, occurs in the
//! module path (case-insensitive). Overview pages take the broad set. A page
//! that matches nothing gets an explicit `NoMatch` instead of every module.

use crate::constants::writer::{MAX_MODULES_PER_PAGE, MIN_KEYWORD_LEN};

/// Words that describe the page rather than the code it covers
const GENERIC_WORDS: &[&str] = &[
    "and", "the", "for", "module", "modules", "reference", "guide", "guides", "docs",
    "documentation", "page", "details", "layer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    ArchitectureOverview,
    ModuleReference,
}

impl PageKind {
    pub fn detect(page_id: &str, title: &str) -> Self {
        let id = page_id.to_lowercase();
        let title = title.to_lowercase();
        let overview = ["overview", "architecture", "intro"]
            .iter()
            .any(|w| id.contains(w) || title.contains(w));
        if overview {
            Self::ArchitectureOverview
        } else {
            Self::ModuleReference
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMatch {
    /// Modules whose path contains all of the page's keywords
    Matched(Vec<String>),
    /// No keyword match; the page covers the project as a whole
    Broad(Vec<String>),
    /// Nothing to write from
    NoMatch,
}

impl ModuleMatch {
    pub fn modules(&self) -> &[String] {
        match self {
            Self::Matched(m) | Self::Broad(m) => m,
            Self::NoMatch => &[],
        }
    }
}

fn keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_KEYWORD_LEN && !GENERIC_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn contains_all(module: &str, words: &[String]) -> bool {
    !words.is_empty() && words.iter().all(|w| module.contains(w.as_str()))
}

/// `modules` is the sorted module list from the Miner output
pub fn resolve_modules(page_id: &str, title: &str, modules: &[String]) -> ModuleMatch {
    if modules.is_empty() {
        return ModuleMatch::NoMatch;
    }

    let by_id = keywords(page_id);
    let by_title = keywords(title);
    let matched: Vec<String> = modules
        .iter()
        .filter(|m| {
            let lower = m.to_lowercase();
            contains_all(&lower, &by_id) || contains_all(&lower, &by_title)
        })
        .take(MAX_MODULES_PER_PAGE)
        .cloned()
        .collect();

    if !matched.is_empty() {
        return ModuleMatch::Matched(matched);
    }

    match PageKind::detect(page_id, title) {
        PageKind::ArchitectureOverview => ModuleMatch::Broad(modules.to_vec()),
        // A single-module project has only one candidate
        PageKind::ModuleReference if modules.len() == 1 => ModuleMatch::Broad(modules.to_vec()),
        PageKind::ModuleReference => ModuleMatch::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_page_kind() {
        assert_eq!(
            PageKind::detect("overview", "Overview"),
            PageKind::ArchitectureOverview
        );
        assert_eq!(
            PageKind::detect("system", "System Architecture"),
            PageKind::ArchitectureOverview
        );
        assert_eq!(
            PageKind::detect("api-routes", "API Routes"),
            PageKind::ModuleReference
        );
    }

    #[test]
    fn test_all_keywords_must_appear() {
        let mods = modules(&["app/api/routes", "app/api", "app/core/db", "root"]);
        assert_eq!(
            resolve_modules("api-routes", "API Routes", &mods),
            ModuleMatch::Matched(modules(&["app/api/routes"]))
        );
        assert_eq!(
            resolve_modules("api", "HTTP API", &mods),
            ModuleMatch::Matched(modules(&["app/api/routes", "app/api"]))
        );
    }

    #[test]
    fn test_case_insensitive_and_generic_words_ignored() {
        let mods = modules(&["src/Storage", "src/net"]);
        assert_eq!(
            resolve_modules("storage-reference", "Storage Module", &mods),
            ModuleMatch::Matched(modules(&["src/Storage"]))
        );
    }

    #[test]
    fn test_match_capped() {
        let mods: Vec<String> = (0..8).map(|i| format!("plugins/p{}", i)).collect();
        assert_eq!(
            resolve_modules("plugins", "Plugins", &mods).modules().len(),
            MAX_MODULES_PER_PAGE
        );
    }

    #[test]
    fn test_overview_falls_back_to_broad() {
        let mods = modules(&["root", "core"]);
        assert_eq!(
            resolve_modules("overview", "Project Overview", &mods),
            ModuleMatch::Broad(mods.clone())
        );
    }

    #[test]
    fn test_unmatched_reference_is_no_match() {
        let mods = modules(&["core", "web"]);
        assert_eq!(
            resolve_modules("billing", "Billing", &mods),
            ModuleMatch::NoMatch
        );
        assert_eq!(resolve_modules("x", "", &[]), ModuleMatch::NoMatch);
    }

    #[test]
    fn test_single_module_project_uses_it() {
        let mods = modules(&["root"]);
        assert_eq!(
            resolve_modules("billing", "Billing", &mods),
            ModuleMatch::Broad(mods.clone())
        );
    }
}
