//! The Split Worker: the data-parallel kernel invoked once per level.
//!
//! Each call consumes the current level's task queue and, for every task,
//! either turns it into a leaf or splits it into one (singleton forwarder)
//! or two child tasks. Contiguous output slots for child tasks and leaves
//! are reserved with a group-local prefix sum followed by a single atomic
//! `fetch_add` per chunk — the CPU analogue of the warp-local allocator
//! described in the design (§5), with a rayon work-stealing chunk standing
//! in for a GPU warp.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::bitskip::bit_skip;
use crate::error::{BuildError, BuildResult};
use crate::node::TreeSink;
use crate::pivot::find_pivot;
use crate::slots::Slots;
use crate::task::SplitTask;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// What a single task resolves to, decided before any slot is reserved so
/// the whole chunk's demand is known ahead of the one atomic-add.
#[derive(Clone, Copy)]
enum Outcome {
    Leaf,
    Single {
        begin: u32,
        end: u32,
        bit: i32,
        has_left: bool,
        has_right: bool,
    },
    Split {
        left: (u32, u32),
        right: (u32, u32),
        bit: i32,
    },
}

impl Outcome {
    fn task_count(&self) -> u32 {
        match self {
            Outcome::Leaf => 0,
            Outcome::Single { .. } => 1,
            Outcome::Split { .. } => 2,
        }
    }
}

fn classify(codes: &[u32], task: SplitTask, max_leaf_size: u32, keep_singletons: bool) -> Outcome {
    let begin = task.begin as usize;
    let end = task.end as usize;
    let mut bit = task.bit;
    if !keep_singletons {
        bit = bit_skip(bit, codes[begin], codes[end - 1]);
    }
    loop {
        if task.len() <= max_leaf_size || bit < 0 {
            return Outcome::Leaf;
        }
        let p = find_pivot(codes, begin, end, bit as u32);
        if p != begin && p != end {
            return Outcome::Split {
                left: (task.begin, p as u32),
                right: (p as u32, task.end),
                bit: bit - 1,
            };
        }
        if keep_singletons {
            return Outcome::Single {
                begin: task.begin,
                end: task.end,
                bit: bit - 1,
                has_left: p != begin,
                has_right: p != end,
            };
        }
        // Defensive: for sorted input bit_skip already guarantees a
        // non-degenerate pivot, so this loop should not iterate in
        // practice. Mirrors the source's "re-run skip on the lowered bit"
        // behaviour rather than assuming it can't happen.
        bit = bit_skip(bit - 1, codes[begin], codes[end - 1]);
    }
}

/// Picks a chunk size that amortises the atomic-add over enough tasks to
/// matter while still leaving enough chunks to keep every thread busy.
fn chunk_size(n: usize) -> usize {
    const TARGET_CHUNKS_PER_THREAD: usize = 4;
    #[cfg(feature = "rayon")]
    let threads = rayon::current_num_threads().max(1);
    #[cfg(not(feature = "rayon"))]
    let threads = 1usize;

    let target_chunks = (threads * TARGET_CHUNKS_PER_THREAD).max(1);
    (n / target_chunks).max(1)
}

#[allow(clippy::too_many_arguments)]
fn process_chunk<S: TreeSink>(
    codes: &[u32],
    chunk: &[SplitTask],
    max_leaf_size: u32,
    keep_singletons: bool,
    out_tasks: &Slots<SplitTask>,
    out_nodes_base: u32,
    leaf_cursor: &AtomicU32,
    leaf_capacity: usize,
    sink: &S,
) -> BuildResult<()> {
    let mut outcomes = Vec::with_capacity(chunk.len());
    let mut chunk_task_count = 0u32;
    let mut chunk_leaf_count = 0u32;
    for &task in chunk {
        let outcome = classify(codes, task, max_leaf_size, keep_singletons);
        chunk_task_count += outcome.task_count();
        if matches!(outcome, Outcome::Leaf) {
            chunk_leaf_count += 1;
        }
        outcomes.push(outcome);
    }

    let task_base = out_tasks.reserve(chunk_task_count);
    if (task_base + chunk_task_count) as usize > out_tasks.capacity() {
        return Err(BuildError::NodeCapacityExceeded {
            capacity: out_tasks.capacity(),
            requested: (task_base + chunk_task_count) as usize,
        });
    }
    let leaf_base = leaf_cursor.fetch_add(chunk_leaf_count, Ordering::Relaxed);
    if (leaf_base + chunk_leaf_count) as usize > leaf_capacity {
        return Err(BuildError::LeafCapacityExceeded {
            capacity: leaf_capacity,
            requested: (leaf_base + chunk_leaf_count) as usize,
        });
    }

    let mut task_off = 0u32;
    let mut leaf_off = 0u32;
    for (task, outcome) in chunk.iter().zip(outcomes) {
        match outcome {
            Outcome::Leaf => {
                let leaf_id = leaf_base + leaf_off;
                leaf_off += 1;
                sink.write_leaf(leaf_id, task.begin, task.end);
                sink.write_node(task.node_id, false, false, leaf_id);
            }
            Outcome::Single {
                begin,
                end,
                bit,
                has_left,
                has_right,
            } => {
                let slot = task_base + task_off;
                task_off += 1;
                let child_id = out_nodes_base + slot;
                // Safety: `slot` came from this chunk's exclusive reservation
                // and is written exactly once across the whole level.
                unsafe {
                    out_tasks.write_at(
                        slot,
                        SplitTask {
                            node_id: child_id,
                            begin,
                            end,
                            bit,
                        },
                    );
                }
                sink.write_node(task.node_id, has_left, has_right, child_id);
            }
            Outcome::Split { left, right, bit } => {
                let slot = task_base + task_off;
                task_off += 2;
                let left_id = out_nodes_base + slot;
                let right_id = left_id + 1;
                unsafe {
                    out_tasks.write_at(
                        slot,
                        SplitTask {
                            node_id: left_id,
                            begin: left.0,
                            end: left.1,
                            bit,
                        },
                    );
                    out_tasks.write_at(
                        slot + 1,
                        SplitTask {
                            node_id: right_id,
                            begin: right.0,
                            end: right.1,
                            bit,
                        },
                    );
                }
                sink.write_node(task.node_id, true, true, left_id);
            }
        }
    }

    Ok(())
}

/// Runs one breadth-first level. Returns the number of new nodes created
/// (equal to the number of child tasks emitted this level).
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_level<S: TreeSink + Sync>(
    codes: &[u32],
    in_tasks: &[SplitTask],
    out_tasks: &Slots<SplitTask>,
    out_nodes_base: u32,
    leaf_cursor: &AtomicU32,
    leaf_capacity: usize,
    max_leaf_size: u32,
    keep_singletons: bool,
    sink: &S,
) -> BuildResult<u32> {
    let size = chunk_size(in_tasks.len());

    #[cfg(feature = "rayon")]
    {
        in_tasks.par_chunks(size).try_for_each(|chunk| {
            process_chunk(
                codes,
                chunk,
                max_leaf_size,
                keep_singletons,
                out_tasks,
                out_nodes_base,
                leaf_cursor,
                leaf_capacity,
                sink,
            )
        })?;
    }
    #[cfg(not(feature = "rayon"))]
    {
        in_tasks.chunks(size).try_for_each(|chunk| {
            process_chunk(
                codes,
                chunk,
                max_leaf_size,
                keep_singletons,
                out_tasks,
                out_nodes_base,
                leaf_cursor,
                leaf_capacity,
                sink,
            )
        })?;
    }

    Ok(out_tasks.len())
}
