//! Validation of stored paths against the current graph topology.
//!
//! A stored path is a walk starting from the node owning the record.
//! The walk follows the edges of a single colour.
//! At non-branching nodes, the walk continues to the only next node.
//! At forks, the next base of the path selects the next node.
//! The walk ends when all bases of the path have been consumed.
//!
//! A path is valid in a colour if:
//!
//! * every node on the walk belongs to the colour;
//! * every node on the walk has at least one next node in the colour;
//! * the second node of the walk has more than one incoming edge in the colour;
//! * each fork has a next node matching the corresponding base of the path.
//!
//! Validation failures indicate that the graph or the path store is corrupted.

use crate::edges;
use crate::graph::{DeBruijnGraph, NodeHandle};
use crate::kmer::{self, Nucleotide};
use crate::nodes::DbNode;
use crate::path_store::{PathRecord, PATH_NULL};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Statistics gathered by [`DeBruijnGraph::check_all_paths`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathStats {
    /// Number of path records.
    pub num_of_paths: usize,
    /// Number of nodes with at least one path.
    pub num_kmers_with_paths: usize,
    /// Total number of (record, colour) pairs validated.
    pub num_of_walks: usize,
    /// Total length of the paths in bases.
    pub num_of_bases: usize,
}

//-----------------------------------------------------------------------------

/// Path validation.
impl DeBruijnGraph {
    /// Checks that the path is a valid walk in the given colour.
    ///
    /// Returns an error naming the offending node and path offset if the walk cannot be followed.
    /// A walk that would continue forever through non-branching nodes without reaching a fork is also an error.
    ///
    /// # Panics
    ///
    /// Will panic if the colour is out of range or the node handle is invalid.
    pub fn check_path(&self, start: DbNode, colour: usize, bases: &[Nucleotide]) -> Result<(), String> {
        let mut node = start;
        // A non-branching walk longer than this has entered a cycle.
        let max_run = 2 * self.nodes() + 1;
        let mut run = 0;

        let mut klen = 0;
        let mut plen = 0;
        while plen < bases.len() {
            if !self.has_colour(node.key, colour) {
                return Err(format!(
                    "Node {}:{} at path offset {} (step {}) is not in colour {}",
                    node.key, orient_code(node), plen, klen, colour
                ));
            }

            if klen == 1 {
                let back_edges = self.edges_in_colour(node.reverse(), colour);
                let indegree = edges::outdegree(back_edges, kmer::flip(node.orient));
                if indegree <= 1 {
                    return Err(format!(
                        "Path from node {}:{} in colour {} does not start at a junction: node {}:{} has indegree {}",
                        start.key, orient_code(start), colour, node.key, orient_code(node), indegree
                    ));
                }
            }

            let next = self.next_nodes(node, self.edges_in_colour(node, colour));
            if next.is_empty() {
                return Err(format!(
                    "Node {}:{} at path offset {} (step {}) has no next nodes in colour {}",
                    node.key, orient_code(node), plen, klen, colour
                ));
            }

            if next.len() > 1 {
                let base = bases[plen];
                match next.iter().find(|candidate| candidate.nuc == base) {
                    Some(candidate) => node = candidate.node,
                    None => {
                        let found: Vec<char> = next.iter().map(|candidate| kmer::decode_base(candidate.nuc) as char).collect();
                        return Err(format!(
                            "Node {}:{} at path offset {} in colour {}: expected {}, found {:?}",
                            node.key, orient_code(node), plen, colour, kmer::decode_base(base) as char, found
                        ));
                    },
                }
                plen += 1;
                run = 0;
            } else {
                node = next[0].node;
                run += 1;
                if run > max_run {
                    return Err(format!(
                        "Path from node {}:{} in colour {} enters a cycle without forks at path offset {}",
                        start.key, orient_code(start), colour, plen
                    ));
                }
            }
            klen += 1;
        }

        Ok(())
    }

    /// Checks that the record is a valid path from the node in every colour of its colour set.
    ///
    /// Returns an error if the colour set is empty, if it contains colours the graph does not have, or if a walk fails.
    pub fn check_record(&self, handle: NodeHandle, record: &PathRecord) -> Result<(), String> {
        if record.colset_is_empty() {
            return Err(format!("Path record {} for node {} has an empty colour set", record.index(), handle));
        }
        let bases = record.bases();
        let start = DbNode::new(handle, record.orient());
        for colour in record.colours() {
            if colour >= self.num_of_cols() {
                return Err(format!(
                    "Path record {} for node {} uses colour {}, but the graph has {} colours",
                    record.index(), handle, colour, self.num_of_cols()
                ));
            }
            self.check_path(start, colour, &bases).map_err(|message| {
                format!("Invalid path record {} for node {}: {}", record.index(), handle, message)
            })?;
        }
        Ok(())
    }

    /// Checks every path in the store and compares the totals with the counters of the store.
    ///
    /// Returns the statistics on success.
    /// Returns an error on the first invalid record or on a counter mismatch.
    pub fn check_all_paths(&self) -> Result<PathStats, String> {
        let store = self.paths();
        let mut stats = PathStats::default();

        for (handle, _) in store.heads().iter().enumerate().filter(|(_, &head)| head != PATH_NULL) {
            if handle >= self.nodes() {
                return Err(format!("Path list for node {} but the graph has {} nodes", handle, self.nodes()));
            }
            let mut found = 0;
            for record in store.paths(handle) {
                let record = record?;
                self.check_record(handle, &record)?;
                stats.num_of_walks += record.colours().len();
                stats.num_of_bases += record.len();
                found += 1;
                // Records only link to older records.
                if let Some(prev) = record.prev() {
                    if prev >= record.index() {
                        return Err(format!(
                            "Path record {} for node {} links to a newer record {}",
                            record.index(), handle, prev
                        ));
                    }
                }
            }
            stats.num_of_paths += found;
            if found > 0 {
                stats.num_kmers_with_paths += 1;
            }
        }

        if stats.num_of_paths != store.num_of_paths() {
            return Err(format!("Found {} paths, expected {}", stats.num_of_paths, store.num_of_paths()));
        }
        if stats.num_kmers_with_paths != store.num_kmers_with_paths() {
            return Err(format!(
                "Found {} nodes with paths, expected {}",
                stats.num_kmers_with_paths, store.num_kmers_with_paths()
            ));
        }
        Ok(stats)
    }
}

fn orient_code(node: DbNode) -> usize {
    crate::nodes::orientation_code(node.orient)
}

//-----------------------------------------------------------------------------
