//! The Driver: the host-side loop that ping-pongs the two task queues,
//! advances the bit level, grows tree storage, and terminates, plus the
//! public [`BuildConfig`]/[`RadixTree`] surface that wraps it.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{BuildError, BuildResult};
use crate::leaf_finalizer;
use crate::node::{Leaf, Node, TreeSink};
use crate::slots::Slots;
use crate::task::SplitTask;
use crate::worker;

/// Configuration for a build, following the builder pattern: construct with
/// [`BuildConfig::new`], chain `set_*` calls, then call [`BuildConfig::build`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    bits: u32,
    max_leaf_size: u32,
    keep_singletons: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            bits: 32,
            max_leaf_size: 1,
            keep_singletons: false,
        }
    }
}

impl BuildConfig {
    /// Equivalent to `BuildConfig::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of significant Morton-code bits to consider, MSB-first. Must
    /// be at least 1.
    pub fn set_bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    /// Maximum number of codes a leaf may cover before it must be split.
    /// Must be at least 1.
    pub fn set_max_leaf_size(&mut self, max_leaf_size: u32) -> &mut Self {
        self.max_leaf_size = max_leaf_size;
        self
    }

    /// Whether a degenerate split (all codes on one side of the chosen bit)
    /// produces an explicit one-child forwarder node, rather than being
    /// absorbed by the bit-skip heuristic.
    pub fn set_keep_singletons(&mut self, keep_singletons: bool) -> &mut Self {
        self.keep_singletons = keep_singletons;
        self
    }

    /// Builds a [`RadixTree`] over `codes`, which must be sorted ascending
    /// and non-empty.
    pub fn build(&self, codes: &[u32]) -> BuildResult<RadixTree> {
        if codes.is_empty() {
            return Err(BuildError::EmptyInput);
        }
        if self.bits == 0 {
            return Err(BuildError::ZeroBits);
        }
        if self.max_leaf_size == 0 {
            return Err(BuildError::ZeroLeafSize);
        }
        if cfg!(debug_assertions) && !codes.windows(2).all(|w| w[0] <= w[1]) {
            return Err(BuildError::UnsortedCodes);
        }

        let n = codes.len();
        let node_capacity_hint =
            ((n + self.max_leaf_size as usize - 1) / self.max_leaf_size as usize) * 2;

        let mut tree = RadixTree {
            nodes: Slots::with_capacity(node_capacity_hint.max(1), Node::PLACEHOLDER),
            leaves: Slots::with_capacity(n, Leaf { begin: 0, end: 0 }),
            total_nodes: 1,
            total_leaves: 0,
        };
        tree.reserve_leaves(n);

        let mut in_tasks: Slots<SplitTask> = Slots::with_capacity(n, SplitTask::PLACEHOLDER);
        let mut out_tasks: Slots<SplitTask> = Slots::with_capacity(n, SplitTask::PLACEHOLDER);
        let leaf_cursor = AtomicU32::new(0);

        in_tasks.reserve(1);
        unsafe {
            in_tasks.write_at(
                0,
                SplitTask {
                    node_id: 0,
                    begin: 0,
                    end: n as u32,
                    bit: self.bits as i32 - 1,
                },
            );
        }

        let mut n_nodes: u32 = 1;
        let mut level: i32 = self.bits as i32 - 1;

        while in_tasks.len() > 0 && level >= 0 {
            log::debug!(
                "radix_tree: level {} starting, {} active tasks, {} nodes so far",
                level,
                in_tasks.len(),
                n_nodes
            );

            let needed = n_nodes as usize + 2 * in_tasks.len() as usize;
            tree.reserve_nodes(needed);
            out_tasks.reset();

            let delta = worker::run_level(
                codes,
                in_tasks.as_slice(),
                &out_tasks,
                n_nodes,
                &leaf_cursor,
                n,
                self.max_leaf_size,
                self.keep_singletons,
                &tree,
            )?;

            n_nodes += delta;
            std::mem::swap(&mut in_tasks, &mut out_tasks);
            level -= 1;
        }

        if in_tasks.len() > 0 {
            log::warn!(
                "radix_tree: bit budget exhausted with {} tasks outstanding, finalising as leaves",
                in_tasks.len()
            );
            leaf_finalizer::finalize(in_tasks.as_slice(), &leaf_cursor, n, &tree)?;
        }

        tree.total_nodes = n_nodes;
        tree.total_leaves = leaf_cursor.load(Ordering::Relaxed);
        log::debug!(
            "radix_tree: build finished, {} nodes, {} leaves",
            tree.total_nodes,
            tree.total_leaves
        );

        Ok(tree)
    }
}

/// The result of a build: a node array and a leaf array, node 0 is the
/// root.
///
/// A downstream post-pass may fold three consecutive binary levels into one
/// octree level by packing `packed = (first_child_index << 8) | mask`,
/// where `mask` is the 8-bit active-child bitmap, and resolving an octant
/// with `get_octant(i) = first_child_index + popcount(mask << (8 - i))`
/// when bit `i` of `mask` is set, or a sentinel otherwise. This crate
/// guarantees only that contiguous triples of Morton-code bits correspond
/// to contiguous binary-tree levels; it does not implement the collapse,
/// the packed representation, or `get_octant` itself — those belong to the
/// downstream consumer.
pub struct RadixTree {
    nodes: Slots<Node>,
    leaves: Slots<Leaf>,
    total_nodes: u32,
    total_leaves: u32,
}

impl RadixTree {
    /// All written nodes, node 0 is the root.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes.as_full_slice()[..self.total_nodes as usize]
    }

    /// All written leaves, in allocation order (not necessarily sorted by
    /// `begin`; see the ordering guarantees in the design).
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves.as_full_slice()[..self.total_leaves as usize]
    }

    pub fn total_nodes(&self) -> usize {
        self.total_nodes as usize
    }

    pub fn total_leaves(&self) -> usize {
        self.total_leaves as usize
    }
}

impl TreeSink for RadixTree {
    fn reserve_nodes(&mut self, n: usize) {
        self.nodes.grow(n, Node::PLACEHOLDER);
    }

    fn reserve_leaves(&mut self, n: usize) {
        self.leaves.grow(n, Leaf { begin: 0, end: 0 });
    }

    fn write_node(&self, node_id: u32, has_left: bool, has_right: bool, first_child_or_leaf_index: u32) {
        let node = if !has_left && !has_right {
            Node::Leaf {
                leaf_index: first_child_or_leaf_index,
            }
        } else {
            Node::Internal {
                has_left,
                has_right,
                first_child_index: first_child_or_leaf_index,
            }
        };
        // Safety: `node_id` is allocated exactly once per the Driver/Split
        // Worker contract (§6/I3), so no two calls ever target the same
        // index concurrently.
        unsafe { self.nodes.write_at(node_id, node) };
    }

    fn write_leaf(&self, leaf_id: u32, begin: u32, end: u32) {
        // Safety: same argument as `write_node`, for leaf ids.
        unsafe { self.leaves.write_at(leaf_id, Leaf { begin, end }) };
    }
}
