//! Wires a backend, the telemetry poller and the metrics server together and
//! runs them until a shutdown signal arrives.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use classifier_common::ProtocolId;
use tokio::{sync::broadcast, task::JoinHandle, time::timeout};
use tracing::{error, info, warn};

use crate::{
    ebpf::EbpfBackend,
    error::AgentError,
    metrics::server::start_metrics_server,
    runtime::{
        capabilities::check_required_capabilities,
        conf::{Backend, Conf},
        shutdown_signal,
    },
    telemetry::{TelemetrySource, run_poller},
    userspace::{
        UserspaceBackend,
        capture::spawn_capture,
        worker::{WORKER_QUEUE_DEPTH, WorkerPool},
    },
};

/// Background tasks that stop when the shutdown channel fires.
struct Tasks {
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Tasks {
    fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push((name, tokio::spawn(future)));
    }

    /// Broadcasts shutdown and waits up to `limit` for every task, aborting
    /// whatever is still running afterwards.
    async fn shutdown(self, limit: Duration) {
        let started = Instant::now();
        let _ = self.shutdown_tx.send(());

        let mut handles = self.handles;
        let joined = timeout(limit, async {
            for (name, handle) in handles.iter_mut() {
                if let Err(e) = handle.await {
                    warn!(
                        event.name = "task.join_failed",
                        task.name = *name,
                        error.message = %e,
                        "task ended abnormally"
                    );
                }
            }
        })
        .await;

        match joined {
            Ok(()) => info!(
                event.name = "agent.shutdown_completed",
                duration_ms = started.elapsed().as_millis(),
                "all tasks completed gracefully"
            ),
            Err(_) => {
                warn!(
                    event.name = "agent.shutdown_timeout",
                    timeout_seconds = limit.as_secs(),
                    "graceful shutdown timed out, cancelling remaining tasks"
                );
                for (_, handle) in &handles {
                    handle.abort();
                }
            }
        }
    }
}

/// Runs the configured backend until SIGINT or SIGTERM.
pub async fn run(conf: Conf) -> Result<(), AgentError> {
    let protocols = conf.protocol_ids();
    let Conf {
        interfaces,
        backend,
        in_flight,
        workers,
        telemetry,
        metrics,
        shutdown_timeout,
        ..
    } = conf;

    crate::metrics::registry::init_registry().map_err(crate::metrics::error::MetricsError::from)?;
    check_required_capabilities(backend)?;

    let mut tasks = Tasks::new();
    let metrics_rx = tasks.subscribe();
    tasks.spawn("metrics_server", async move {
        if let Err(e) = start_metrics_server(metrics, metrics_rx).await {
            error!(
                event.name = "metrics.server_failed",
                error.message = %e,
                "metrics server stopped"
            );
        }
    });

    info!(
        event.name = "agent.starting",
        backend = %backend,
        protocols = ?protocols.iter().map(ProtocolId::as_str).collect::<Vec<_>>(),
        interfaces = ?interfaces,
        "starting protocol classifier"
    );

    match backend {
        Backend::Ebpf => {
            let max_entries = u32::try_from(in_flight.max_entries).unwrap_or(u32::MAX);
            let mut kernel = EbpfBackend::load(&protocols, max_entries)?;
            for iface in &interfaces {
                kernel.attach(iface)?;
            }
            let source: Arc<dyn TelemetrySource> = kernel.telemetry();
            let poller_rx = tasks.subscribe();
            tasks.spawn("telemetry_poller", run_poller(source, telemetry.interval, poller_rx));

            shutdown_signal().await;
            tasks.shutdown(shutdown_timeout).await;
            // Dropping the loaded object detaches the programs.
            drop(kernel);
        }
        Backend::Userspace => {
            let user = Arc::new(UserspaceBackend::with_protocols(
                workers,
                in_flight.max_entries,
                &protocols,
            ));
            let pool = Arc::new(WorkerPool::spawn(Arc::clone(&user), WORKER_QUEUE_DEPTH)?);
            let stop = Arc::new(AtomicBool::new(false));
            let mut captures = Vec::with_capacity(interfaces.len());
            for iface in &interfaces {
                captures.push(spawn_capture(iface, Arc::clone(&pool), Arc::clone(&stop))?);
            }
            let source: Arc<dyn TelemetrySource> = user;
            let poller_rx = tasks.subscribe();
            tasks.spawn("telemetry_poller", run_poller(source, telemetry.interval, poller_rx));

            shutdown_signal().await;
            stop.store(true, Ordering::Relaxed);
            let drained = tokio::task::spawn_blocking(move || {
                for capture in captures {
                    let _ = capture.join();
                }
                pool.shutdown();
            });
            if timeout(shutdown_timeout, drained).await.is_err() {
                warn!(
                    event.name = "agent.drain_timeout",
                    "workers did not drain before the shutdown timeout"
                );
            }
            tasks.shutdown(shutdown_timeout).await;
        }
    }

    Ok(())
}
