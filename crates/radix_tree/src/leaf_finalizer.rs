//! The Leaf Finaliser: the terminal kernel the Driver calls once after the
//! level loop exits, for whichever tasks are still outstanding once the
//! configured bit budget is spent. By construction (bit-skip only ever
//! lowers a task's bit, never raises it) every remaining task's `bit` is
//! already negative by this point, so this kernel never splits — it only
//! allocates a leaf slot and writes the owning node.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{BuildError, BuildResult};
use crate::node::TreeSink;
use crate::task::SplitTask;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

fn finalize_chunk<S: TreeSink>(
    chunk: &[SplitTask],
    leaf_cursor: &AtomicU32,
    leaf_capacity: usize,
    sink: &S,
) -> BuildResult<()> {
    let base = leaf_cursor.fetch_add(chunk.len() as u32, Ordering::Relaxed);
    if base as usize + chunk.len() > leaf_capacity {
        return Err(BuildError::LeafCapacityExceeded {
            capacity: leaf_capacity,
            requested: base as usize + chunk.len(),
        });
    }
    for (i, task) in chunk.iter().enumerate() {
        let leaf_id = base + i as u32;
        sink.write_leaf(leaf_id, task.begin, task.end);
        sink.write_node(task.node_id, false, false, leaf_id);
    }
    Ok(())
}

/// Turns every remaining task directly into a leaf.
pub(crate) fn finalize<S: TreeSink + Sync>(
    tasks: &[SplitTask],
    leaf_cursor: &AtomicU32,
    leaf_capacity: usize,
    sink: &S,
) -> BuildResult<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    const CHUNK: usize = 1024;

    #[cfg(feature = "rayon")]
    {
        tasks
            .par_chunks(CHUNK)
            .try_for_each(|chunk| finalize_chunk(chunk, leaf_cursor, leaf_capacity, sink))
    }
    #[cfg(not(feature = "rayon"))]
    {
        tasks
            .chunks(CHUNK)
            .try_for_each(|chunk| finalize_chunk(chunk, leaf_cursor, leaf_capacity, sink))
    }
}
