//! Capacity - provider の資源ヒントから 1 ノードあたりのタスク数を見積もる
//!
//! ヒントが未設定（None）のときは「不明」として扱い、その制約は使いません。

use crate::ports::ResourceHints;

/// Per-task resource needs used when sizing a node.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFootprint {
    pub cores_per_task: f64,

    /// Memory per task in GB; `None` means no memory constraint.
    pub mem_per_task: Option<f64>,

    /// Hard cap regardless of node size.
    pub max_tasks_per_node: u32,
}

impl Default for TaskFootprint {
    fn default() -> Self {
        Self {
            cores_per_task: 1.0,
            mem_per_task: None,
            max_tasks_per_node: u32::MAX,
        }
    }
}

/// How many tasks fit on one node, or `None` if no hint bounds it.
pub fn tasks_per_node(hints: &ResourceHints, footprint: &TaskFootprint) -> Option<u32> {
    let by_cores = hints
        .cores_per_node
        .filter(|_| footprint.cores_per_task > 0.0)
        .map(|cores| (f64::from(cores) / footprint.cores_per_task).floor());
    let by_mem = hints
        .mem_per_node
        .zip(footprint.mem_per_task)
        .filter(|(_, per_task)| *per_task > 0.0)
        .map(|(mem, per_task)| (mem / per_task).floor());

    let bound = match (by_cores, by_mem) {
        (Some(c), Some(m)) => c.min(m),
        (Some(c), None) => c,
        (None, Some(m)) => m,
        (None, None) => {
            return (footprint.max_tasks_per_node != u32::MAX)
                .then_some(footprint.max_tasks_per_node);
        }
    };

    let bound = bound.clamp(0.0, f64::from(u32::MAX)) as u32;
    Some(bound.min(footprint.max_tasks_per_node))
}
