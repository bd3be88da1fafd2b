use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{LEAF_LEVEL, ORPHAN_BUCKET, ROOT_LEVEL, ThemeHierarchy, ThemeNode, ThemeTree};
use crate::store::{Store, StoreError};

/// One row of a per-level topic table: a topic and the name of its parent one level up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRow {
    pub name: String,
    #[serde(default)]
    pub parent: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LevelTableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a level table: a header row, then one topic per record with its name in the
/// first column and its parent's name in the second. Extra columns are ignored.
pub fn read_level_table<R: Read>(reader: R) -> Result<Vec<LevelRow>, LevelTableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = clean_cell(record.get(0));
        if name.is_empty() {
            continue;
        }
        rows.push(LevelRow {
            name,
            parent: clean_cell(record.get(1)),
        });
    }
    Ok(rows)
}

/// Loads a level table from disk: `.json` files hold `{name, parent}` rows, anything
/// else is read as CSV.
pub fn load_level_table(path: &Path) -> Result<Vec<LevelRow>, LevelTableError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        Ok(serde_json::from_reader(file)?)
    } else {
        read_level_table(file)
    }
}

// Spreadsheet exports carry the apostrophe as its Latin-1 reading.
fn clean_cell(cell: Option<&str>) -> String {
    cell.unwrap_or_default()
        .replace("â€™", "'")
        .trim()
        .to_string()
}

/// Assigns identifiers and parent links to a nested forest, parents first.
pub fn flatten_forest(trees: &[ThemeTree]) -> Vec<ThemeNode> {
    let mut nodes = Vec::new();
    let mut stack: Vec<(&ThemeTree, Option<String>)> =
        trees.iter().rev().map(|t| (t, None)).collect();

    while let Some((tree, parent_id)) = stack.pop() {
        let mut node = ThemeNode::new(tree.name.clone(), tree.level, None).with_total(tree.total);
        node.parent_theme_identifier = parent_id;

        let id = node.unique_identifier.clone();
        stack.extend(tree.children.iter().rev().map(|c| (c, Some(id.clone()))));
        nodes.push(node);
    }

    nodes
}

/// Upserts every topic of a nested forest. Identifiers derive from name and level,
/// so importing the same forest twice leaves the store unchanged.
pub fn import_forest(store: &dyn Store, trees: &[ThemeTree]) -> Result<usize, StoreError> {
    let nodes = flatten_forest(trees);
    // Reject malformed forests before anything is written.
    ThemeHierarchy::new(nodes.clone())?;

    // Leaves first.
    for node in nodes.iter().rev() {
        store.upsert_theme(node)?;
    }
    log::info!("Imported {} themes", nodes.len());
    Ok(nodes.len())
}

/// Builds the nested forest from four level tables (index 0 holds the leaves).
///
/// Roots are the level-3 rows. Level-1 rows whose parent is the orphan bucket
/// become roots of their own, appended after the level-3 roots.
pub fn compact_levels(levels: &[Vec<LevelRow>; 4]) -> Vec<ThemeTree> {
    // Trees of the level just built, grouped by parent name.
    let mut below: HashMap<&str, Vec<ThemeTree>> = HashMap::new();
    let mut orphans = Vec::new();

    for level in LEAF_LEVEL..ROOT_LEVEL {
        let mut current: HashMap<&str, Vec<ThemeTree>> = HashMap::new();
        for row in &levels[level as usize] {
            let tree = ThemeTree {
                name: row.name.clone(),
                level,
                total: 0,
                children: below.get(row.name.as_str()).cloned().unwrap_or_default(),
            };
            if level == 1 && row.parent == ORPHAN_BUCKET {
                orphans.push(tree);
            } else {
                current.entry(row.parent.as_str()).or_default().push(tree);
            }
        }
        below = current;
    }

    let mut forest = levels[ROOT_LEVEL as usize]
        .iter()
        .map(|row| ThemeTree {
            name: row.name.clone(),
            level: ROOT_LEVEL,
            total: 0,
            children: below.get(row.name.as_str()).cloned().unwrap_or_default(),
        })
        .collect::<Vec<_>>();
    forest.extend(orphans);
    forest
}

/// Recomputes totals: a leaf counts the stored documents filed under its name and
/// a topic with children sums them, level by level upward.
pub fn aggregate_totals(store: &dyn Store) -> Result<usize, StoreError> {
    let hierarchy = ThemeHierarchy::new(store.themes()?)?;
    let mut totals: HashMap<String, u64> = HashMap::new();
    let mut updated = 0;

    for level in LEAF_LEVEL..=ROOT_LEVEL {
        let mut nodes = hierarchy.at_level(level).collect::<Vec<_>>();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));

        for node in nodes {
            let total = if level == LEAF_LEVEL {
                store.count_questions_by_theme(&node.name)?
            } else {
                let mut children = hierarchy.children_of(&node.unique_identifier).peekable();
                if children.peek().is_none() {
                    totals.insert(node.unique_identifier.clone(), node.total);
                    continue;
                }
                children
                    .map(|c| totals.get(&c.unique_identifier).copied().unwrap_or(c.total))
                    .sum()
            };

            totals.insert(node.unique_identifier.clone(), total);
            if total != node.total {
                store.upsert_theme(&node.clone().with_total(total))?;
                updated += 1;
            }
        }
    }

    log::info!("Updated totals of {} themes", updated);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{QuestionEntity, RawQuestion};

    fn row(name: &str, parent: &str) -> LevelRow {
        LevelRow {
            name: name.to_string(),
            parent: parent.to_string(),
        }
    }

    fn levels() -> [Vec<LevelRow>; 4] {
        [
            vec![
                row("acier", "industrie"),
                row("textile", "industrie"),
                row("artisanat", "commerce"),
                row("dom", "outre-mer"),
            ],
            vec![
                row("industrie", "entreprises"),
                row("commerce", "entreprises"),
                row("outre-mer", ORPHAN_BUCKET),
            ],
            vec![row("entreprises", "économie")],
            vec![row("économie", "")],
        ]
    }

    fn question(id: &str, theme: &str) -> QuestionEntity {
        QuestionEntity::new(RawQuestion {
            id: id.to_string(),
            theme: theme.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_compact_levels() {
        let forest = compact_levels(&levels());

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].name, "économie");
        assert_eq!(forest[0].children[0].name, "entreprises");
        assert_eq!(forest[0].children[0].children.len(), 2);
        assert_eq!(forest[0].children[0].children[0].children.len(), 2);
        assert_eq!(forest[1].name, "outre-mer");
        assert_eq!(forest[1].level, 1);
        assert_eq!(forest[1].children[0].name, "dom");
    }

    #[test]
    fn test_compact_csv_level_tables() {
        let tables = [0, 1, 2, 3].map(|level| {
            load_level_table(Path::new(&format!("fixtures/themes/level_{level}.csv"))).unwrap()
        });

        assert_eq!(tables[0][0], row("aide à l'enfance", "famille"));
        assert_eq!(tables[3][0], row("société", ""));

        let forest = compact_levels(&tables);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].name, "société");
        assert_eq!(forest[0].children[0].name, "solidarités");
        assert_eq!(forest[0].children[0].children[0].name, "famille");
        assert_eq!(forest[0].children[0].children[0].children.len(), 2);
        assert_eq!(forest[1].name, "outre-mer");
        assert_eq!(forest[1].children[0].name, "dom");
    }

    #[test]
    fn test_level_table_skips_blank_names() {
        let csv = "nom,parent,commentaire\nacier,industrie,x\n,industrie\ntextile,industrie\n";
        let rows = read_level_table(csv.as_bytes()).unwrap();
        assert_eq!(rows, [row("acier", "industrie"), row("textile", "industrie")]);
    }

    #[test]
    fn test_flatten_forest_links_parents() {
        let nodes = flatten_forest(&compact_levels(&levels()));
        assert_eq!(nodes.len(), 9);

        let hierarchy = ThemeHierarchy::new(nodes).unwrap();
        assert_eq!(hierarchy.resolve("acier", 0, 3).unwrap().name, "économie");
        assert_eq!(hierarchy.resolve("dom", 0, 3).unwrap().name, "outre-mer");
    }

    #[test]
    fn test_import_is_idempotent_and_round_trips() {
        let store = MemoryStore::new();
        let forest = compact_levels(&levels());

        assert_eq!(import_forest(&store, &forest).unwrap(), 9);
        let first = store.themes().unwrap();
        import_forest(&store, &forest).unwrap();
        let second = store.themes().unwrap();
        assert_eq!(first, second);

        let exported = store.hierarchy().unwrap().trees();
        let reimported = MemoryStore::new();
        import_forest(&reimported, &exported).unwrap();
        assert_eq!(reimported.themes().unwrap(), first);
    }

    #[test]
    fn test_aggregate_totals() {
        let store = MemoryStore::new();
        import_forest(&store, &compact_levels(&levels())).unwrap();
        for (id, theme) in [("9-1QE", "acier"), ("9-2QE", "acier"), ("9-3QE", "artisanat")] {
            store.upsert_question(&question(id, theme)).unwrap();
        }

        aggregate_totals(&store).unwrap();
        let hierarchy = store.hierarchy().unwrap();

        assert_eq!(hierarchy.find("acier", 0).unwrap().total, 2);
        assert_eq!(hierarchy.find("industrie", 1).unwrap().total, 2);
        assert_eq!(hierarchy.find("entreprises", 2).unwrap().total, 3);
        assert_eq!(hierarchy.find("économie", 3).unwrap().total, 3);
        assert_eq!(hierarchy.find("outre-mer", 1).unwrap().total, 0);

        assert_eq!(aggregate_totals(&store).unwrap(), 0);
    }
}
