use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{Instrument, info_span, warn};

use crate::monitors::HostMonitor;

/// Outcome of one pass over every host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_hosts: Vec<String>,
    pub elapsed: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed in {:.1}s",
            self.succeeded,
            self.failed,
            self.elapsed.as_secs_f64()
        )?;
        if !self.failed_hosts.is_empty() {
            write!(f, " ({})", self.failed_hosts.join(", "))?;
        }
        Ok(())
    }
}

/// Aborts the host tasks of a cycle that is dropped before it completes.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Run `work` for every monitor, host `i` starting `i * spread` after the
/// cycle began.
///
/// Every host runs in its own task bounded by `host_timeout`; an error,
/// timeout or panic fails that host only.
pub async fn run_staggered<F, Fut>(
    monitors: &[Arc<dyn HostMonitor>],
    spread: Duration,
    host_timeout: Duration,
    work: F,
) -> CycleReport
where
    F: Fn(Arc<dyn HostMonitor>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let start = Instant::now();

    let handles: Vec<_> = monitors
        .iter()
        .enumerate()
        .map(|(index, monitor)| {
            let name = monitor.identity().name.clone();
            let delay = spread.saturating_mul(index as u32);
            let item = work(monitor.clone());
            let span = info_span!("host", host = %name);

            let handle = tokio::spawn(
                async move {
                    tokio::time::sleep(delay).await;
                    match tokio::time::timeout(host_timeout, item).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!(
                            "timed out after {}s",
                            host_timeout.as_secs_f64()
                        )),
                    }
                }
                .instrument(span),
            );
            (name, handle)
        })
        .collect();

    let _cancel = AbortOnDrop(handles.iter().map(|(_, handle)| handle.abort_handle()).collect());

    let mut report = CycleReport::default();
    for (name, handle) in handles {
        let failure = match handle.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(e) => Some(format!("task failed: {e}")),
        };

        match failure {
            None => report.succeeded += 1,
            Some(reason) => {
                warn!("{name}: {reason}");
                report.failed += 1;
                report.failed_hosts.push(name);
            }
        }
    }

    report.elapsed = start.elapsed();
    report
}
