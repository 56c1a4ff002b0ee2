//! Lineage index: parent → children adjacency rebuilt from parent pointers
//!
//! Lineage is never persisted. Each traversal builds a request-scoped index
//! from the results it can see, then walks it breadth first.
//!
//! ## Traversal contract
//!
//! - depth is counted in parent/child hops (0 = root only)
//! - the root is always returned
//! - with a tag filter, descendants are returned only if they carry one of
//!   the tags, but the walk continues through non-matching nodes
//! - output is level order; within a level, discovery order over children
//!   sorted by id

use crate::error::{PerfError, Result};
use crate::model::PerformanceResult;
use std::collections::{HashMap, HashSet, VecDeque};

/// Request-scoped adjacency view over a set of results
#[derive(Debug, Default)]
pub struct LineageIndex {
    nodes: HashMap<String, PerformanceResult>,
    children: HashMap<String, Vec<String>>,
}

impl LineageIndex {
    /// Build the index from any snapshot of results.
    pub fn from_results(results: impl IntoIterator<Item = PerformanceResult>) -> Self {
        let mut index = Self::default();
        for result in results {
            index.insert(result);
        }
        index.finish();
        index
    }

    fn insert(&mut self, result: PerformanceResult) {
        if !result.info.parent.is_empty() {
            self.children
                .entry(result.info.parent.clone())
                .or_default()
                .push(result.id.clone());
        }
        self.nodes.insert(result.id.clone(), result);
    }

    /// Sort children so discovery order does not depend on insertion order.
    fn finish(&mut self) {
        for ids in self.children.values_mut() {
            ids.sort();
            ids.dedup();
        }
    }

    /// Direct children of `id` that are present in the index
    pub fn children_of(&self, id: &str) -> impl Iterator<Item = &PerformanceResult> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child))
    }

    /// Breadth-first walk from `root_id` up to `max_depth` hops.
    ///
    /// Fails with `NotFound` if the root is not in the index.
    pub fn traverse(
        &self,
        root_id: &str,
        max_depth: usize,
        tags: &[String],
    ) -> Result<Vec<PerformanceResult>> {
        let root = self
            .nodes
            .get(root_id)
            .ok_or_else(|| PerfError::not_found(format!("performance result '{}'", root_id)))?;

        let mut out = vec![root.clone()];
        let mut visited: HashSet<&str> = HashSet::from([root_id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(root_id, 0)]);

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for child in self.children_of(id) {
                // A corrupted parent cycle must not loop forever
                if !visited.insert(child.id.as_str()) {
                    continue;
                }
                if tags.is_empty() || child.info.has_any_tag(tags) {
                    out.push(child.clone());
                }
                queue.push_back((child.id.as_str(), depth + 1));
            }
        }

        Ok(out)
    }

    /// Every id in the subtree rooted at `root_id`, root first.
    ///
    /// Empty if the root is not in the index.
    pub fn descendants(&self, root_id: &str) -> Vec<String> {
        if !self.nodes.contains_key(root_id) {
            return vec![];
        }
        let mut out = vec![root_id.to_string()];
        let mut visited: HashSet<&str> = HashSet::from([root_id]);
        let mut queue: VecDeque<&str> = VecDeque::from([root_id]);

        while let Some(id) = queue.pop_front() {
            for child in self.children_of(id) {
                if visited.insert(child.id.as_str()) {
                    out.push(child.id.clone());
                    queue.push_back(child.id.as_str());
                }
            }
        }
        out
    }
}
