//! Phase Prompts
//!
//! System prompts name the submission tool each phase must call; user
//! messages carry the material (file content, module summary, facts).

pub const SUBMIT_FACTS: &str = "submit_facts";
pub const SUBMIT_NAVIGATION: &str = "submit_navigation";
pub const SUBMIT_PAGE: &str = "submit_page";

pub const MINER_SYSTEM: &str = r#"You extract architectural facts from a single source file.

## What to extract
- Definite statements about what the code does and how: name the types,
  functions, libraries and patterns involved.
- Entry points, data flow, configuration sources, error handling,
  security checks, caching, concurrency, and how the file talks to the
  rest of the system.
- Skip boilerplate, trivial accessors and anything you would have to guess.

## Each fact
- topic: short domain label (Auth, Database, API, Configuration, ...)
- impact: HIGH for core architecture or critical paths, MEDIUM for notable
  features or integrations, LOW for helpers
- statement: 30-60 words, specific to this file

A file with little substance still gets one or two short facts.

## Output
Call `submit_facts` exactly once with every fact in the `facts` array."#;

pub fn miner_user(file_path: &str, content: &str) -> String {
    format!(
        "File: {}\n\n```\n{}\n```\n\nExtract the facts for this file and submit them.",
        file_path, content
    )
}

pub const ARCHITECT_SYSTEM: &str = r#"You design the documentation sidebar for a software project.

## Input
Modules of the project with the facts mined from their files.

## Task
- Build a navigation tree: `category` nodes group related `page` nodes.
- Start with an overview page (id `overview`).
- Give every significant module a page. Reuse words from the module path
  in page ids and labels so pages can be matched back to their code.
- Keep labels short and plain.

## Output
Call `submit_navigation` once with the whole tree."#;

pub fn architect_user(project_id: &str, module_summary: &str) -> String {
    format!(
        "Project: {}\n\nMODULES:\n{}\n\nDesign the navigation tree and submit it.",
        project_id, module_summary
    )
}

pub const SCRIBE_ARCHITECTURE_SYSTEM: &str = r#"You write the architecture overview page of a project's documentation.

## Input
The page title and the technical facts mined from the relevant modules.

## Page
- What the system (or subsystem) is responsible for.
- The main components and how requests or data move between them.
- Patterns the code relies on, and the key libraries.
- A Mermaid diagram (`graph TD` or `sequenceDiagram`) of the structure or
  main flow, in the `diagram` field.

Write for developers: precise, no filler, only what the facts support.

## Output
Call `submit_page` once with the Markdown body in `content`."#;

pub const SCRIBE_REFERENCE_SYSTEM: &str = r#"You write a module reference page for a project's documentation.

## Input
The page title and, per module, the files with the facts mined from them.

## Page
- One sentence on what the module is for.
- A section per important file (`## File: name`) covering its purpose and
  key types or functions.
- Which other modules it depends on or serves, as far as the facts show.

Write for developers: precise, no filler, only what the facts support.

## Output
Call `submit_page` once with the Markdown body in `content`."#;

pub fn scribe_user(page_title: &str, facts: &str) -> String {
    format!("Page Title: {}\n\nTECHNICAL FACTS:\n{}", page_title, facts)
}
