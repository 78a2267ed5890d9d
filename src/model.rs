/// Point-in-time snapshot of a pool's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub workers: usize,
    pub queued_tasks: usize,
    pub active_tasks: usize,
    pub total_submitted: usize,
    pub completed_tasks: usize,
    pub panicked_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / self.workers as f64
    }

    pub fn pending(&self) -> usize {
        self.queued_tasks + self.active_tasks
    }

    pub fn success_rate(&self) -> f64 {
        if self.completed_tasks == 0 {
            return 1.0;
        }
        let succeeded = self.completed_tasks.saturating_sub(self.panicked_tasks);
        succeeded as f64 / self.completed_tasks as f64
    }
}
