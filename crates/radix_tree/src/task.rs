//! The split task: the unit of work a breadth-first level passes between
//! the Driver and the Split Worker.

/// "Tree node at index `node_id` is responsible for the half-open code
/// range `[begin, end)` and will split on bit `bit`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTask {
    pub node_id: u32,
    pub begin: u32,
    pub end: u32,
    pub bit: i32,
}

impl SplitTask {
    pub const PLACEHOLDER: SplitTask = SplitTask {
        node_id: 0,
        begin: 0,
        end: 0,
        bit: -1,
    };

    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }
}
