//! Host resource probing for download worker sizing

use sysinfo::System;

const GIB: u64 = 1024 * 1024 * 1024;

/// Absolute ceiling on the recommendation, independent of host size
const HARD_WORKER_CAP: usize = 16;

/// Recommended concurrent fetch worker count for this host
///
/// Budgets one worker per GiB of total memory, at most twice the physical
/// core count, with an absolute ceiling of 16 and a floor of 1. Host state
/// is re-read on every call; nothing is cached, so two calls on an
/// unchanged host return the same number.
pub fn recommended_workers() -> usize {
    let physical_cores = num_cpus::get_physical();
    let sys = System::new_all();
    let total_memory_bytes = sys.total_memory();

    let recommended = compute_worker_count(physical_cores, total_memory_bytes);
    tracing::debug!(
        physical_cores,
        total_memory_bytes,
        recommended,
        "probed host for worker sizing"
    );
    recommended
}

/// Pure sizing rule, split out so the clamping is testable without a host
fn compute_worker_count(physical_cores: usize, total_memory_bytes: u64) -> usize {
    let core_budget = physical_cores.saturating_mul(2);
    let memory_budget = (total_memory_bytes / GIB) as usize;
    core_budget.min(memory_budget).min(HARD_WORKER_CAP).max(1)
}
