use std::sync::{OnceLock, RwLock};
use std::time::Instant;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub total_mb: u64,
    pub used_mb: u64,
    pub avail_mb: u64,
}

static SYS: OnceLock<RwLock<System>> = OnceLock::new();

#[inline]
fn sys_handle() -> &'static RwLock<System> {
    SYS.get_or_init(|| {
        RwLock::new(System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        ))
    })
}

pub fn memory_stats_mb() -> MemoryStats {
    let Ok(mut sys) = sys_handle().write() else {
        return MemoryStats::default();
    };
    sys.refresh_memory();
    // sysinfo reports bytes
    let total_mb = sys.total_memory() / (1024 * 1024);
    let avail_mb = sys.available_memory() / (1024 * 1024);
    MemoryStats {
        total_mb,
        used_mb: total_mb.saturating_sub(avail_mb),
        avail_mb,
    }
}

/// Snapshot emitted after every committed batch.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: &'static str,
    pub batch: usize,
    pub processed: u64,
    /// Known upper bound for the run, when the stage can count it up front.
    pub total: Option<u64>,
    pub rows_per_sec: f64,
    pub eta_secs: Option<u64>,
    pub mem_used_mb: u64,
    pub mem_avail_mb: u64,
}

impl ProgressUpdate {
    pub fn percent(&self) -> Option<f32> {
        self.total.map(|t| {
            if t == 0 {
                100.0
            } else {
                (self.processed as f64 / t as f64 * 100.0) as f32
            }
        })
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    stage: &'static str,
    total: Option<u64>,
    started: Instant,
    batches: usize,
}

impl ProgressTracker {
    pub fn new(stage: &'static str, total: Option<u64>) -> Self {
        Self {
            stage,
            total,
            started: Instant::now(),
            batches: 0,
        }
    }

    pub fn batch_done(&mut self, processed: u64) -> ProgressUpdate {
        self.batches += 1;
        let elapsed = self.started.elapsed().as_secs_f64();
        let rows_per_sec = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        let eta_secs = match self.total {
            Some(t) if rows_per_sec > 0.0 => {
                Some((t.saturating_sub(processed) as f64 / rows_per_sec).ceil() as u64)
            }
            _ => None,
        };
        let mem = memory_stats_mb();
        let update = ProgressUpdate {
            stage: self.stage,
            batch: self.batches,
            processed,
            total: self.total,
            rows_per_sec,
            eta_secs,
            mem_used_mb: mem.used_mb,
            mem_avail_mb: mem.avail_mb,
        };
        match (update.total, update.percent()) {
            (Some(total), Some(pct)) => log::info!(
                "[{}] batch {}: {}/{} rows ({:.1}%), {:.0} rows/s, eta {}s, mem used {}MB avail {}MB",
                update.stage,
                update.batch,
                update.processed,
                total,
                pct,
                update.rows_per_sec,
                update.eta_secs.unwrap_or(0),
                update.mem_used_mb,
                update.mem_avail_mb
            ),
            _ => log::info!(
                "[{}] batch {}: processed {} rows so far, {:.0} rows/s, mem used {}MB avail {}MB",
                update.stage,
                update.batch,
                update.processed,
                update.rows_per_sec,
                update.mem_used_mb,
                update.mem_avail_mb
            ),
        }
        update
    }
}
