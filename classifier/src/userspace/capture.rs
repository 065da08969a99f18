//! Raw frame capture feeding the worker pool.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use pnet::datalink::{self, Channel, Config, NetworkInterface};
use tracing::{debug, error, info};

use crate::{error::AgentError, userspace::worker::WorkerPool};

/// How long a blocked read waits before the stop flag is checked again.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub fn find_interface(name: &str) -> Result<NetworkInterface, AgentError> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| AgentError::InterfaceNotFound(name.to_string()))
}

/// Opens a raw channel on `interface` and forwards every frame to `pool` from a
/// dedicated thread until `stop` is set.
pub fn spawn_capture(
    interface: &str,
    pool: Arc<WorkerPool>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AgentError> {
    let iface = find_interface(interface)?;
    let config = Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
    };
    let mut rx = match datalink::channel(&iface, config) {
        Ok(Channel::Ethernet(_tx, rx)) => rx,
        Ok(_) => return Err(AgentError::UnsupportedChannel(interface.to_string())),
        Err(e) => return Err(AgentError::capture(interface, e)),
    };

    let name = iface.name.clone();
    info!(
        event.name = "capture.started",
        network.interface.name = %name,
        "capturing frames"
    );

    thread::Builder::new()
        .name(format!("capture-{name}"))
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match rx.next() {
                    Ok(frame) => {
                        pool.submit(frame.to_vec());
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        error!(
                            event.name = "capture.read_failed",
                            network.interface.name = %name,
                            error.message = %e,
                            "frame capture stopped"
                        );
                        break;
                    }
                }
            }
            debug!(
                event.name = "capture.stopped",
                network.interface.name = %name,
                "capture thread exiting"
            );
        })
        .map_err(|e| AgentError::capture(interface, e))
}
