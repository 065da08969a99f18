//! Kernel backend: loads the TC programs, wires the dispatch table and reads
//! back the per-CPU counters.

use std::sync::Arc;

use aya::{
    Ebpf, EbpfLoader,
    maps::{HashMap, MapData, PerCpuArray, ProgramArray},
    programs::{SchedClassifier, TcAttachType, tc},
};
use classifier_common::{ConnInfo, ConnTuple, ProtocolId, TelemetryCounter};
use tracing::{debug, info, warn};

use crate::{
    error::AgentError,
    telemetry::{TelemetrySnapshot, TelemetrySource},
};

/// Object produced by the build script. Empty when the kernel side was not built.
static EMBEDDED: &[u8] = aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/classifier-ebpf"));

pub const CLASSIFIER_PROGRAM: &str = "protocol_classifier";
pub const IN_FLIGHT_MAP: &str = "PROTO_IN_FLIGHT";
pub const DISPATCH_MAP: &str = "PROTO_PROGS";
pub const TELEMETRY_MAP: &str = "CLASSIFIER_TELEMETRY";

/// Name of the handler program tail-called for `protocol`.
pub fn handler_program(protocol: ProtocolId) -> Option<&'static str> {
    match protocol {
        ProtocolId::Tls => Some("tls_handler"),
        ProtocolId::Http => Some("http_handler"),
        ProtocolId::Unknown => None,
    }
}

/// Removes the locked-memory limit for kernels without memcg accounting.
fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!(
            event.name = "ebpf.rlimit_failed",
            system.rlimit.type = "memlock",
            error.code = ret,
            "failed to remove limit on locked memory"
        );
    }
}

pub struct EbpfBackend {
    ebpf: Ebpf,
    // Entries only live as long as the map handle.
    _dispatch: ProgramArray<MapData>,
    telemetry: Arc<EbpfTelemetry>,
}

impl EbpfBackend {
    /// Loads the embedded object with a dispatch entry for each of `protocols`.
    pub fn load(protocols: &[ProtocolId], in_flight_max_entries: u32) -> Result<Self, AgentError> {
        Self::load_from(EMBEDDED, protocols, in_flight_max_entries)
    }

    pub fn load_from(
        object: &[u8],
        protocols: &[ProtocolId],
        in_flight_max_entries: u32,
    ) -> Result<Self, AgentError> {
        if object.is_empty() {
            return Err(AgentError::EbpfUnavailable);
        }
        bump_memlock_rlimit();

        let mut ebpf = EbpfLoader::new()
            .set_max_entries(IN_FLIGHT_MAP, in_flight_max_entries)
            .load(object)?;
        if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
            // Happens when the object carries no log statements.
            warn!(
                event.name = "ebpf.logger_init_failed",
                error.message = %e,
                "failed to initialize eBPF logger"
            );
        }

        let mut handlers = Vec::with_capacity(protocols.len());
        for &protocol in protocols {
            let Some(name) = handler_program(protocol) else {
                continue;
            };
            let program = program_mut(&mut ebpf, name)?;
            program.load()?;
            handlers.push((protocol, program.fd()?.try_clone()?));
        }

        let map = ebpf
            .take_map(DISPATCH_MAP)
            .ok_or(AgentError::MissingMap(DISPATCH_MAP))?;
        let mut dispatch = ProgramArray::try_from(map)?;
        for (protocol, fd) in &handlers {
            dispatch.set(protocol.index(), fd, 0)?;
            info!(
                event.name = "ebpf.handler_registered",
                protocol = protocol.as_str(),
                "{} monitoring enabled",
                protocol.as_str()
            );
        }

        program_mut(&mut ebpf, CLASSIFIER_PROGRAM)?.load()?;

        let counters = ebpf
            .take_map(TELEMETRY_MAP)
            .ok_or(AgentError::MissingMap(TELEMETRY_MAP))?;
        let in_flight = ebpf
            .take_map(IN_FLIGHT_MAP)
            .ok_or(AgentError::MissingMap(IN_FLIGHT_MAP))?;
        let telemetry = Arc::new(EbpfTelemetry {
            counters: PerCpuArray::try_from(counters)?,
            in_flight: HashMap::try_from(in_flight)?,
        });

        Ok(Self {
            ebpf,
            _dispatch: dispatch,
            telemetry,
        })
    }

    /// Attaches the entry program to both directions of `interface`.
    pub fn attach(&mut self, interface: &str) -> Result<(), AgentError> {
        // Fails harmlessly when the qdisc already exists.
        if let Err(e) = tc::qdisc_add_clsact(interface) {
            debug!(
                event.name = "ebpf.qdisc_add_skipped",
                network.interface.name = %interface,
                error.message = %e,
                "clsact qdisc add failed (likely already exists)"
            );
        }
        let program = program_mut(&mut self.ebpf, CLASSIFIER_PROGRAM)?;
        for direction in [TcAttachType::Ingress, TcAttachType::Egress] {
            program.attach(interface, direction)?;
        }
        info!(
            event.name = "ebpf.program_attached",
            network.interface.name = %interface,
            "classifier attached to interface"
        );
        Ok(())
    }

    pub fn telemetry(&self) -> Arc<EbpfTelemetry> {
        Arc::clone(&self.telemetry)
    }
}

fn program_mut<'a>(
    ebpf: &'a mut Ebpf,
    name: &'static str,
) -> Result<&'a mut SchedClassifier, AgentError> {
    let program: &mut SchedClassifier = ebpf
        .program_mut(name)
        .ok_or(AgentError::MissingProgram(name))?
        .try_into()?;
    Ok(program)
}

/// Reads the kernel's counters and in-flight table.
pub struct EbpfTelemetry {
    counters: PerCpuArray<MapData, u64>,
    in_flight: HashMap<MapData, ConnTuple, ConnInfo>,
}

impl TelemetrySource for EbpfTelemetry {
    fn snapshot(&self) -> Result<TelemetrySnapshot, AgentError> {
        let mut snapshot = TelemetrySnapshot::default();
        for counter in TelemetryCounter::ALL {
            let values = self.counters.get(&counter.index(), 0)?;
            snapshot.add(counter, values.iter().sum());
        }
        Ok(snapshot)
    }

    fn in_flight_entries(&self) -> Option<usize> {
        Some(self.in_flight.keys().filter(Result::is_ok).count())
    }
}
