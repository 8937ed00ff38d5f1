use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::log::EventSink;
use crate::probe;
use crate::render::Dashboard;
use crate::store::ResultStore;
use crate::types::Target;

/// Knobs for one probing round.
#[derive(Debug, Clone)]
pub struct RoundOptions {
    /// Per-attempt probe timeout.
    pub timeout: Duration,
    /// Cap on concurrently running probes.
    pub max_in_flight: usize,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            max_in_flight: 64,
        }
    }
}

/// Wall-clock budget for a whole round: liveness plus port-scan time for
/// one target, with a fixed joining margin.
pub fn round_deadline(timeout: Duration) -> Duration {
    timeout * 2 + Duration::from_secs(10)
}

/// Run one full probing round over `targets`, redrawing the dashboard as
/// results land.
///
/// Every target gets exactly one probe task. Tasks are gated by a
/// semaphore sized by `max_in_flight`, acquired inside the task so every
/// row shows up on the dashboard immediately while probes trickle through
/// the gate. Each task runs under the round deadline and a cancellation
/// token (Ctrl-C cancels the round), so an overrunning probe is aborted
/// rather than left mutating the store after the round; whatever the
/// store last recorded for it is what the final table shows.
pub async fn run_round<W: Write>(
    store: &ResultStore,
    sink: &Arc<dyn EventSink>,
    dashboard: &mut Dashboard<W>,
    targets: Vec<Target>,
    opts: &RoundOptions,
) -> Result<()> {
    for target in &targets {
        store.register(&target.name, &target.address).await?;
    }
    dashboard.draw(&store.snapshot().await)?;

    let deadline = round_deadline(opts.timeout);
    let sem = Arc::new(Semaphore::new(opts.max_in_flight.clamp(1, 5_000)));
    let cancel = CancellationToken::new();

    // Ctrl-C ends the round early.
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let mut set = JoinSet::new();
    for target in targets {
        let store = store.clone();
        let sink = Arc::clone(sink);
        let sem = Arc::clone(&sem);
        let cancel = cancel.clone();
        let timeout = opts.timeout;

        set.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    sink.notify(&format!("{}: probe cancelled", target.name));
                }
                joined = time::timeout(deadline, probe::probe_target(&store, &sink, &target, timeout)) => {
                    match joined {
                        Ok(Ok(())) => {}
                        // A store fault is fatal to this target only.
                        Ok(Err(fault)) => sink.error(&format!("{}: {fault}", target.name)),
                        Err(_elapsed) => sink.notify(&format!(
                            "{}: probe still running at the deadline, left as-is",
                            target.name
                        )),
                    }
                }
            }
        });
    }

    // Redraw as each probe joins; bound the whole wait by the deadline.
    let wall = Instant::now() + deadline;
    loop {
        match time::timeout_at(wall, set.join_next()).await {
            Ok(Some(joined)) => {
                if let Err(e) = joined {
                    // A panicked probe is fatal to its own target only.
                    sink.error(&format!("[round]: probe task failed: {e}"));
                }
                dashboard.draw(&store.snapshot().await)?;
            }
            Ok(None) => break,
            Err(_elapsed) => {
                sink.notify("[round]: deadline reached, cancelling outstanding probes");
                cancel.cancel();
                set.abort_all();
                while set.join_next().await.is_some() {}
                break;
            }
        }
    }

    dashboard.draw(&store.snapshot().await)?;
    Ok(())
}
