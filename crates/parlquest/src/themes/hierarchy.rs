use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{LEAF_LEVEL, ROOT_LEVEL, ThemeNode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("Theme level {0} is out of range ({LEAF_LEVEL}..={ROOT_LEVEL})")]
    LevelOutOfRange(u8),
    #[error("Theme '{child}' at level {child_level} has a parent at level {parent_level}")]
    LevelMismatch {
        child: String,
        child_level: u8,
        parent_level: u8,
    },
    #[error("Unknown theme identifier {0}")]
    UnknownIdentifier(String),
    #[error("No theme named '{name}' at level {level}")]
    UnknownName { name: String, level: u8 },
    #[error("Theme '{name}' at level {level} has no parent, level {stop} cannot be reached")]
    MissingParent { name: String, level: u8, stop: u8 },
    #[error("Theme '{name}' points to a parent {parent} that does not exist")]
    DanglingParent { name: String, parent: String },
}

/// Nested view of a topic and everything below it. This is also the on-disk shape
/// of hierarchy files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeTree {
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub total: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ThemeTree>,
}

/// Adjacency index over a set of topics. Parent levels are checked on build, so
/// every parent chain strictly climbs and traversals need no cycle guard.
#[derive(Debug, Clone, Default)]
pub struct ThemeHierarchy {
    nodes: HashMap<String, ThemeNode>,
    children: HashMap<String, Vec<String>>,
    by_name: HashMap<(String, u8), String>,
    roots: Vec<String>,
}

impl ThemeHierarchy {
    pub fn new(themes: impl IntoIterator<Item = ThemeNode>) -> Result<Self, HierarchyError> {
        let mut nodes = HashMap::new();
        let mut by_name = HashMap::new();

        for theme in themes {
            if theme.level > ROOT_LEVEL {
                return Err(HierarchyError::LevelOutOfRange(theme.level));
            }
            by_name.insert(
                (theme.name.clone(), theme.level),
                theme.unique_identifier.clone(),
            );
            nodes.insert(theme.unique_identifier.clone(), theme);
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots = Vec::new();

        for theme in nodes.values() {
            let Some(parent_id) = &theme.parent_theme_identifier else {
                roots.push(theme.unique_identifier.clone());
                continue;
            };
            // Dangling parents are reported when a resolution walks into them.
            let Some(parent) = nodes.get(parent_id) else {
                continue;
            };
            if parent.level != theme.level + 1 {
                return Err(HierarchyError::LevelMismatch {
                    child: theme.name.clone(),
                    child_level: theme.level,
                    parent_level: parent.level,
                });
            }
            children
                .entry(parent_id.clone())
                .or_default()
                .push(theme.unique_identifier.clone());
        }

        let sort_key = |id: &String| {
            let node = &nodes[id];
            (std::cmp::Reverse(node.level), node.name.clone())
        };
        roots.sort_by_key(sort_key);
        for ids in children.values_mut() {
            ids.sort_by_key(sort_key);
        }

        Ok(Self {
            nodes,
            children,
            by_name,
            roots,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&ThemeNode> {
        self.nodes.get(identifier)
    }

    pub fn find(&self, name: &str, level: u8) -> Option<&ThemeNode> {
        self.by_name
            .get(&(name.to_string(), level))
            .and_then(|id| self.nodes.get(id))
    }

    fn lookup(&self, name: &str, level: u8) -> Result<&ThemeNode, HierarchyError> {
        self.find(name, level).ok_or_else(|| HierarchyError::UnknownName {
            name: name.to_string(),
            level,
        })
    }

    fn node(&self, identifier: &str) -> Result<&ThemeNode, HierarchyError> {
        self.nodes
            .get(identifier)
            .ok_or_else(|| HierarchyError::UnknownIdentifier(identifier.to_string()))
    }

    pub fn children_of(&self, identifier: &str) -> impl Iterator<Item = &ThemeNode> {
        self.children
            .get(identifier)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
    }

    pub fn at_level(&self, level: u8) -> impl Iterator<Item = &ThemeNode> {
        self.nodes.values().filter(move |n| n.level == level)
    }

    /// Climbs from `identifier` until a topic at `stop_at_level` is reached.
    ///
    /// A parentless topic above the leaf level is a root (level-1 topics promoted
    /// out of the orphan bucket are roots too) and ends the climb. A parentless
    /// leaf, or a parent reference to a missing topic, fails the resolution.
    pub fn resolve_from(
        &self,
        identifier: &str,
        stop_at_level: u8,
    ) -> Result<&ThemeNode, HierarchyError> {
        if stop_at_level > ROOT_LEVEL {
            return Err(HierarchyError::LevelOutOfRange(stop_at_level));
        }

        let mut current = self.node(identifier)?;
        while current.level < stop_at_level {
            match &current.parent_theme_identifier {
                Some(parent_id) => {
                    current = self.nodes.get(parent_id).ok_or_else(|| {
                        HierarchyError::DanglingParent {
                            name: current.name.clone(),
                            parent: parent_id.clone(),
                        }
                    })?;
                }
                None if current.level > LEAF_LEVEL => break,
                None => {
                    return Err(HierarchyError::MissingParent {
                        name: current.name.clone(),
                        level: current.level,
                        stop: stop_at_level,
                    });
                }
            }
        }

        Ok(current)
    }

    /// Ancestor of the topic named `name` at `from_level`, taken at `stop_at_level`.
    pub fn resolve(
        &self,
        name: &str,
        from_level: u8,
        stop_at_level: u8,
    ) -> Result<&ThemeNode, HierarchyError> {
        let start = self.lookup(name, from_level)?;
        self.resolve_from(&start.unique_identifier, stop_at_level)
    }

    /// Nested subtrees under `identifier`, excluding the topic itself.
    pub fn subtree(&self, identifier: &str) -> Result<Vec<ThemeTree>, HierarchyError> {
        self.node(identifier)?;
        Ok(self
            .children
            .get(identifier)
            .into_iter()
            .flatten()
            .filter_map(|id| self.build_tree(id))
            .collect())
    }

    /// Every topic as a forest, broadest roots first.
    pub fn trees(&self) -> Vec<ThemeTree> {
        self.roots.iter().filter_map(|id| self.build_tree(id)).collect()
    }

    /// Topics under `identifier` in depth-first order, excluding the topic itself.
    pub fn descendants(&self, identifier: &str) -> Result<Vec<&ThemeNode>, HierarchyError> {
        self.node(identifier)?;

        let mut out = Vec::new();
        let mut stack: Vec<&str> = self
            .children
            .get(identifier)
            .into_iter()
            .flatten()
            .rev()
            .map(String::as_str)
            .collect();

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push(node);
            if let Some(ids) = self.children.get(id) {
                stack.extend(ids.iter().rev().map(String::as_str));
            }
        }

        Ok(out)
    }

    /// Names of every topic under the given coarse labels, used as the set of
    /// answers accepted for a document filed under one of them.
    pub fn accepted_labels(
        &self,
        coarse: &[&str],
        level: u8,
    ) -> Result<BTreeSet<String>, HierarchyError> {
        let mut labels = BTreeSet::new();
        for name in coarse {
            let node = self.lookup(name, level)?;
            labels.extend(
                self.descendants(&node.unique_identifier)?
                    .into_iter()
                    .map(|n| n.name.clone()),
            );
        }
        Ok(labels)
    }

    fn build_tree(&self, identifier: &str) -> Option<ThemeTree> {
        let mut built: HashMap<&str, ThemeTree> = HashMap::new();
        let mut stack = vec![(identifier, false)];

        while let Some((id, expanded)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let child_ids = self.children.get(id).map(Vec::as_slice).unwrap_or_default();

            if expanded {
                let children = child_ids
                    .iter()
                    .filter_map(|c| built.remove(c.as_str()))
                    .collect();
                built.insert(
                    id,
                    ThemeTree {
                        name: node.name.clone(),
                        level: node.level,
                        total: node.total,
                        children,
                    },
                );
            } else {
                stack.push((id, true));
                stack.extend(child_ids.iter().rev().map(|c| (c.as_str(), false)));
            }
        }

        built.remove(identifier)
    }
}
