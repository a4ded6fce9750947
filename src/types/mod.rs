pub mod error;
pub mod fact;
pub mod navigation;
pub mod page;

pub use error::{DocError, ErrorCategory, ErrorClassifier, LlmError, Result};
pub use fact::{Fact, FileFactSet, Impact, MinerOutput, ROOT_MODULE, module_of};
pub use navigation::{NavigationNode, NavigationTree, NodeKind, slugify};
pub use page::PageContent;
