use crate::error::Result;
use crate::state::{GraphState, NodeId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sitegraph_catalog::Catalog;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const NEIGHBORS_FILE: &str = "neighbors.json";
pub const TOPICS_FILE: &str = "topics.json";
pub const INBOUND_COUNTS_FILE: &str = "inbound_counts.json";

/// Outgoing links of one page, by slug
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborEntry {
    pub recommendations: Vec<String>,
    pub alternatives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explore: Option<String>,
}

/// The three build outputs. `BTreeMap` keeps serialisation order canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteArtifacts {
    pub neighbors: BTreeMap<String, NeighborEntry>,
    pub topics: BTreeMap<String, Vec<String>>,
    pub inbound_counts: BTreeMap<String, usize>,
}

impl SiteArtifacts {
    pub fn assemble(catalog: &Catalog, state: &GraphState, inbound: &[usize]) -> Self {
        let items = catalog.items();
        let slug = |node: &NodeId| items[*node].slug.clone();

        let neighbors = items
            .iter()
            .zip(&state.links)
            .map(|(item, links)| {
                let entry = NeighborEntry {
                    recommendations: links.recommendations.iter().map(slug).collect(),
                    alternatives: links.alternatives.iter().map(slug).collect(),
                    explore: links.explore.as_ref().map(slug),
                };
                (item.slug.clone(), entry)
            })
            .collect();

        let inbound_counts = items
            .iter()
            .zip(inbound)
            .map(|(item, &count)| (item.slug.clone(), count))
            .collect();

        Self {
            neighbors,
            topics: topic_index(catalog),
            inbound_counts,
        }
    }
}

/// Topic -> sorted slugs of the items carrying it
pub fn topic_index(catalog: &Catalog) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for item in catalog.items() {
        for topic in &item.topics {
            index.entry(topic.clone()).or_default().insert(item.slug.clone());
        }
    }
    index
        .into_iter()
        .map(|(topic, slugs)| (topic, slugs.into_iter().collect()))
        .collect()
}

/// A committed artifact file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub name: &'static str,
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
}

/// Write all three artifacts into `dir`, or none of them.
///
/// Everything is serialised before the first write. Each file goes to
/// `<name>.json.tmp` first; renames happen only after every temporary is on
/// disk. A file being replaced is moved to `<name>.json.bak` until the whole
/// set is in place, so a failed rename restores the previous set and removes
/// the temporaries.
pub fn write_artifacts(dir: impl AsRef<Path>, artifacts: &SiteArtifacts) -> Result<Vec<WrittenArtifact>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let encoded = [
        (NEIGHBORS_FILE, to_json(&artifacts.neighbors)?),
        (TOPICS_FILE, to_json(&artifacts.topics)?),
        (INBOUND_COUNTS_FILE, to_json(&artifacts.inbound_counts)?),
    ];

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(encoded.len());
    for (name, bytes) in &encoded {
        let path = dir.join(name);
        let tmp = path.with_extension("json.tmp");
        if let Err(err) = std::fs::write(&tmp, bytes) {
            let _ = std::fs::remove_file(&tmp);
            discard(&staged);
            return Err(err.into());
        }
        staged.push((tmp, path));
    }

    let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());
    for (tmp, path) in &staged {
        if let Err(err) = commit(tmp, path, &mut committed) {
            log::warn!("Restoring previous artifacts in {}: {err}", dir.display());
            roll_back(&committed);
            discard(&staged);
            return Err(err.into());
        }
    }
    for backup in committed.iter().filter_map(|entry| entry.backup.as_ref()) {
        let _ = std::fs::remove_file(backup);
    }

    let written = encoded
        .iter()
        .zip(staged)
        .map(|((name, bytes), (_, path))| WrittenArtifact {
            name: *name,
            path,
            sha256: format!("{:x}", Sha256::digest(bytes)),
        })
        .collect();

    log::info!("Wrote artifacts to {}", dir.display());
    Ok(written)
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = std::fs::remove_file(tmp);
    }
}

/// One rename of the commit phase
struct Committed {
    path: PathBuf,
    /// Where the replaced file was moved
    backup: Option<PathBuf>,
    /// Whether the temporary reached `path`
    placed: bool,
}

/// Move any previous file aside, then rename the temporary into place
fn commit(tmp: &Path, path: &Path, committed: &mut Vec<Committed>) -> std::io::Result<()> {
    let backup = if path.exists() {
        let backup = path.with_extension("json.bak");
        std::fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };
    let result = std::fs::rename(tmp, path);
    committed.push(Committed {
        path: path.to_path_buf(),
        backup,
        placed: result.is_ok(),
    });
    result
}

fn roll_back(committed: &[Committed]) {
    for entry in committed.iter().rev() {
        if entry.placed {
            let _ = std::fs::remove_file(&entry.path);
        }
        if let Some(backup) = &entry.backup {
            if let Err(err) = std::fs::rename(backup, &entry.path) {
                log::warn!("Could not restore {}: {err}", entry.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::catalog;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> SiteArtifacts {
        let catalog = catalog(&[
            ("alpha", "Alpha Lamp", "lighting", "$40"),
            ("bravo", "Bravo Lamp", "lighting", "$25"),
            ("charlie", "Charlie Tent", "outdoor", "$300"),
        ]);
        let mut state = GraphState::new(3);
        state.links[0].recommendations = vec![1];
        state.links[0].alternatives = vec![2];
        state.links[1].recommendations = vec![2];
        state.links[1].explore = Some(0);
        state.links[2].recommendations = vec![0, 1];
        SiteArtifacts::assemble(&catalog, &state, &[2, 2, 2])
    }

    #[test]
    fn assembles_slug_keyed_maps() {
        let artifacts = sample();

        assert_eq!(artifacts.neighbors["bravo"].explore.as_deref(), Some("alpha"));
        assert_eq!(artifacts.neighbors["charlie"].recommendations, vec!["alpha", "bravo"]);
        assert_eq!(artifacts.topics["lamp"], vec!["alpha", "bravo"]);
        assert_eq!(artifacts.inbound_counts["charlie"], 2);
    }

    #[test]
    fn neighbor_entries_omit_missing_explore() {
        let artifacts = sample();
        let alpha = serde_json::to_value(&artifacts.neighbors["alpha"]).unwrap();
        let bravo = serde_json::to_value(&artifacts.neighbors["bravo"]).unwrap();

        assert!(alpha.get("explore").is_none());
        assert_eq!(bravo["explore"], "alpha");
        assert_eq!(alpha["recommendations"][0], "bravo");
    }

    #[test]
    fn writes_all_files_without_temporaries() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");

        let written = write_artifacts(&out, &sample()).unwrap();

        let names: Vec<&str> = written.iter().map(|w| w.name).collect();
        assert_eq!(names, vec![NEIGHBORS_FILE, TOPICS_FILE, INBOUND_COUNTS_FILE]);
        for artifact in &written {
            assert!(artifact.path.exists());
            assert_eq!(artifact.sha256.len(), 64);
        }
        let leftovers: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let counts: BTreeMap<String, usize> =
            serde_json::from_slice(&std::fs::read(out.join(INBOUND_COUNTS_FILE)).unwrap()).unwrap();
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn failed_write_commits_nothing() {
        let temp = TempDir::new().unwrap();
        // A directory squatting on a temporary path makes that write fail
        std::fs::create_dir_all(temp.path().join("topics.json.tmp")).unwrap();

        let result = write_artifacts(temp.path(), &sample());

        assert!(result.is_err());
        assert!(!temp.path().join(NEIGHBORS_FILE).exists());
        assert!(!temp.path().join("neighbors.json.tmp").exists());
        assert!(!temp.path().join(INBOUND_COUNTS_FILE).exists());
    }

    #[test]
    fn failed_rename_restores_previous_set() {
        let temp = TempDir::new().unwrap();
        write_artifacts(temp.path(), &sample()).unwrap();
        let read = |name: &str| std::fs::read(temp.path().join(name)).unwrap();
        let before = [read(NEIGHBORS_FILE), read(TOPICS_FILE), read(INBOUND_COUNTS_FILE)];

        let mut changed = sample();
        changed.neighbors.get_mut("alpha").unwrap().alternatives.clear();
        changed.inbound_counts.insert("alpha".to_string(), 3);
        // The last file cannot be moved aside onto a directory
        let squatter = temp.path().join("inbound_counts.json.bak");
        std::fs::create_dir_all(&squatter).unwrap();
        std::fs::write(squatter.join("keep"), b"x").unwrap();

        let result = write_artifacts(temp.path(), &changed);

        assert!(result.is_err());
        let after = [read(NEIGHBORS_FILE), read(TOPICS_FILE), read(INBOUND_COUNTS_FILE)];
        assert_eq!(after, before);
        let mut names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![INBOUND_COUNTS_FILE, "inbound_counts.json.bak", NEIGHBORS_FILE, TOPICS_FILE]
        );
    }

    #[test]
    fn rewrite_replaces_files_and_drops_backups() {
        let temp = TempDir::new().unwrap();
        write_artifacts(temp.path(), &sample()).unwrap();
        let mut changed = sample();
        changed.inbound_counts.insert("alpha".to_string(), 3);

        write_artifacts(temp.path(), &changed).unwrap();

        let counts: BTreeMap<String, usize> =
            serde_json::from_slice(&std::fs::read(temp.path().join(INBOUND_COUNTS_FILE)).unwrap())
                .unwrap();
        assert_eq!(counts["alpha"], 3);
        assert!(!temp.path().join("inbound_counts.json.bak").exists());
        assert!(!temp.path().join("neighbors.json.bak").exists());
    }
}
