mod hierarchy;
pub mod ingest;

pub use hierarchy::{HierarchyError, ThemeHierarchy, ThemeTree};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Level of the finest topics, the ones documents are filed under.
pub const LEAF_LEVEL: u8 = 0;
/// Level of the broadest topics.
pub const ROOT_LEVEL: u8 = 3;
/// Parent name used in level tables for level-1 topics that sit outside any level-2 group.
pub const ORPHAN_BUCKET: &str = "vide";

/// `hex(sha256(name ++ decimal(level)))`.
pub fn theme_identifier(name: &str, level: u8) -> String {
    hex::encode(Sha256::digest(format!("{name}{level}").as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeNode {
    pub name: String,
    pub unique_identifier: String,
    pub parent_theme_identifier: Option<String>,
    pub level: u8,
    #[serde(default)]
    pub total: u64,
}

impl ThemeNode {
    pub fn new(name: impl Into<String>, level: u8, parent: Option<&ThemeNode>) -> Self {
        let name = name.into();
        Self {
            unique_identifier: theme_identifier(&name, level),
            parent_theme_identifier: parent.map(|p| p.unique_identifier.clone()),
            name,
            level,
            total: 0,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }
}

impl std::fmt::Display for ThemeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (level {}, {} questions)", self.name, self.level, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_deterministic() {
        let a = theme_identifier("agriculture", 0);
        assert_eq!(a, theme_identifier("agriculture", 0));
        assert_eq!(a.len(), 64);
        assert_ne!(a, theme_identifier("agriculture", 1));
        assert_eq!(
            theme_identifier("", 0),
            "5feceb66ffc86f38d952786c6d696c79c2dbc239dd4e91b46729d73a27fb57e9"
        );
    }

    #[test]
    fn test_node_links_parent() {
        let parent = ThemeNode::new("économie", 1, None);
        let child = ThemeNode::new("entreprises", 0, Some(&parent));
        assert_eq!(
            child.parent_theme_identifier.as_deref(),
            Some(parent.unique_identifier.as_str())
        );
    }
}
