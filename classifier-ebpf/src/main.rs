#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::TC_ACT_PIPE,
    helpers::bpf_get_smp_processor_id,
    macros::{classifier, map},
    maps::{Array, HashMap, PerCpuArray, ProgramArray},
    programs::TcContext,
};
use aya_log_ebpf::{debug, warn};
use classifier_common::{
    ConnInfo, ConnTuple, Dispatcher, IN_FLIGHT_MAX_ENTRIES, InFlight, MAX_CPUS, Outcome, Packet,
    PROTOCOL_MAX, PacketContext, ProtocolId, Staging, TELEMETRY_COUNTERS, Telemetry,
    TelemetryCounter, classify,
    handler::{HandlerVerdict, handle},
};

/// Classification state per normalized connection tuple.
#[map]
static PROTO_IN_FLIGHT: HashMap<ConnTuple, ConnInfo> =
    HashMap::with_max_entries(IN_FLIGHT_MAX_ENTRIES, 0);

/// One staging slot per CPU, read by the handler the dispatcher jumps to.
#[map]
static PROTOCOL_ARGS: Array<PacketContext> = Array::with_max_entries(MAX_CPUS, 0);

/// Handler programs indexed by protocol id. Populated from userspace.
#[map]
static PROTO_PROGS: ProgramArray = ProgramArray::with_max_entries(PROTOCOL_MAX, 0);

#[map]
static CLASSIFIER_TELEMETRY: PerCpuArray<u64> =
    PerCpuArray::with_max_entries(TELEMETRY_COUNTERS, 0);

struct Skb<'a>(&'a TcContext);

impl Packet for Skb<'_> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.0.len() as usize
    }

    #[inline(always)]
    fn load<T: Copy>(&self, offset: usize) -> Result<T, ()> {
        self.0.load::<T>(offset).map_err(|_| ())
    }
}

struct KernelInFlight;

impl InFlight for KernelInFlight {
    #[inline(always)]
    fn lookup(&self, tup: &ConnTuple) -> Option<ConnInfo> {
        unsafe { PROTO_IN_FLIGHT.get(tup) }.copied()
    }

    #[inline(always)]
    fn mark_done(&self, tup: &ConnTuple) {
        let _ = PROTO_IN_FLIGHT.insert(tup, &ConnInfo::DONE, 0);
    }

    #[inline(always)]
    fn mark_failed(&self, tup: &ConnTuple) {
        let _ = PROTO_IN_FLIGHT.insert(tup, &ConnInfo::FAILED, 0);
    }

    #[inline(always)]
    fn evict(&self, tup: &ConnTuple) {
        let _ = PROTO_IN_FLIGHT.remove(tup);
    }
}

struct PerCpuSlot;

impl Staging for PerCpuSlot {
    #[inline(always)]
    fn stage(&self, cpu: u32, ctx: &PacketContext) -> Result<(), ()> {
        let slot = PROTOCOL_ARGS.get_ptr_mut(cpu).ok_or(())?;
        unsafe { *slot = *ctx };
        Ok(())
    }
}

struct TailCall<'a>(&'a TcContext);

impl<P: Packet + ?Sized> Dispatcher<P> for TailCall<'_> {
    #[inline(always)]
    fn dispatch(&self, _pkt: &P, _cpu: u32, protocol: ProtocolId) -> Result<(), ()> {
        unsafe {
            let _ = PROTO_PROGS.tail_call(self.0, protocol.index());
        }
        // Only reached when the jump did not happen.
        Err(())
    }
}

struct KernelTelemetry;

impl Telemetry for KernelTelemetry {
    #[inline(always)]
    fn increment(&self, counter: TelemetryCounter) {
        if let Some(value) = CLASSIFIER_TELEMETRY.get_ptr_mut(counter.index()) {
            unsafe { *value += 1 };
        }
    }
}

/// Entry point. Observes only: every path hands the packet on unchanged.
#[classifier]
pub fn protocol_classifier(ctx: TcContext) -> i32 {
    let cpu = unsafe { bpf_get_smp_processor_id() };
    let outcome = classify(
        &Skb(&ctx),
        cpu,
        &KernelInFlight,
        &PerCpuSlot,
        &TailCall(&ctx),
        &KernelTelemetry,
    );
    match outcome {
        Outcome::StagingFailed(protocol) => {
            warn!(
                &ctx,
                "classifier: no staging slot on cpu {} for protocol {}", cpu, protocol as u8
            );
        }
        Outcome::DispatchFailed(protocol) => {
            debug!(&ctx, "classifier: no handler for protocol {}", protocol as u8);
        }
        _ => {}
    }
    TC_ACT_PIPE
}

#[classifier]
pub fn tls_handler(ctx: TcContext) -> i32 {
    run_handler(&ctx, ProtocolId::Tls);
    TC_ACT_PIPE
}

#[classifier]
pub fn http_handler(ctx: TcContext) -> i32 {
    run_handler(&ctx, ProtocolId::Http);
    TC_ACT_PIPE
}

#[inline(always)]
fn run_handler(ctx: &TcContext, protocol: ProtocolId) {
    let cpu = unsafe { bpf_get_smp_processor_id() };
    let Some(slot) = PROTOCOL_ARGS.get_ptr(cpu) else {
        return;
    };
    let staged: PacketContext = unsafe { *slot };
    if staged.protocol != protocol as u8 {
        return;
    }

    let table = KernelInFlight;
    match handle(protocol, &staged, &Skb(ctx)) {
        HandlerVerdict::Confirmed => {
            table.mark_done(&staged.tup);
            debug!(ctx, "classifier: {} confirmed on cpu {}", protocol as u8, cpu);
        }
        HandlerVerdict::Rejected => table.mark_failed(&staged.tup),
        HandlerVerdict::NeedMore => {}
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 6] = *b"GPLv2\0";
