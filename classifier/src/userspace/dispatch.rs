//! Handler registry and the indirect call that stands in for a tail call.

use std::sync::Arc;

use classifier_common::{
    Dispatcher, InFlight, PROTOCOL_MAX, PacketContext, ProtocolId,
    handler::{self, HandlerVerdict},
};
use tracing::{info, warn};

use crate::userspace::{in_flight::InFlightTable, staging::StagingBuffer};

/// Runs after dispatch for one protocol.
pub trait ProtocolHandler: Send + Sync {
    fn protocol(&self) -> ProtocolId;

    /// `staged` is whatever the calling CPU's slot holds; `frame` is the
    /// packet that triggered dispatch.
    fn handle(&self, staged: &PacketContext, frame: &[u8]) -> HandlerVerdict;
}

pub struct TlsHandler;

impl ProtocolHandler for TlsHandler {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::Tls
    }

    fn handle(&self, staged: &PacketContext, frame: &[u8]) -> HandlerVerdict {
        handler::handle(ProtocolId::Tls, staged, frame)
    }
}

pub struct HttpHandler;

impl ProtocolHandler for HttpHandler {
    fn protocol(&self) -> ProtocolId {
        ProtocolId::Http
    }

    fn handle(&self, staged: &PacketContext, frame: &[u8]) -> HandlerVerdict {
        handler::handle(ProtocolId::Http, staged, frame)
    }
}

/// The handler shipped for `protocol`, if any.
pub fn builtin_handler(protocol: ProtocolId) -> Option<Arc<dyn ProtocolHandler>> {
    match protocol {
        ProtocolId::Tls => Some(Arc::new(TlsHandler)),
        ProtocolId::Http => Some(Arc::new(HttpHandler)),
        ProtocolId::Unknown => None,
    }
}

type Slots = [Option<Arc<dyn ProtocolHandler>>; PROTOCOL_MAX as usize];

/// Immutable protocol-indexed handler table.
pub struct DispatchTable {
    handlers: Slots,
}

#[derive(Default)]
pub struct DispatchTableBuilder {
    handlers: Slots,
}

impl DispatchTableBuilder {
    /// Installs `handler` at its protocol's index, replacing any previous one.
    /// Handlers for `Unknown` are refused: that index is never dispatched.
    pub fn register(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        let protocol = handler.protocol();
        if !protocol.is_known() {
            warn!(
                event.name = "dispatch.register_refused",
                protocol = protocol.as_str(),
                "refusing handler for unknown protocol"
            );
            return self;
        }
        self.handlers[protocol.index() as usize] = Some(handler);
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            handlers: self.handlers,
        }
    }
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// A table with the built-in handler for each of `protocols`.
    pub fn with_protocols(protocols: &[ProtocolId]) -> Self {
        let mut builder = Self::builder();
        for protocol in protocols {
            if let Some(handler) = builtin_handler(*protocol) {
                builder = builder.register(handler);
                info!(
                    event.name = "dispatch.protocol_enabled",
                    protocol = protocol.as_str(),
                    "{} monitoring enabled",
                    protocol.as_str()
                );
            }
        }
        builder.build()
    }

    pub fn handler(&self, protocol: ProtocolId) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers.get(protocol.index() as usize)?.as_ref()
    }

    pub fn is_registered(&self, protocol: ProtocolId) -> bool {
        self.handler(protocol).is_some()
    }
}

/// Dispatch seam for the userspace backend: looks the handler up, feeds it
/// the calling CPU's slot and applies the verdict to the table.
pub struct Trampoline<'a> {
    pub table: &'a DispatchTable,
    pub staging: &'a StagingBuffer,
    pub in_flight: &'a InFlightTable,
}

impl Dispatcher<[u8]> for Trampoline<'_> {
    fn dispatch(&self, frame: &[u8], cpu: u32, protocol: ProtocolId) -> Result<(), ()> {
        let handler = self.table.handler(protocol).ok_or(())?;
        // An empty slot fails the same way a missing handler does and is
        // counted as tail_call_failed by the caller.
        let staged = self.staging.read(cpu).ok_or(())?;

        match handler.handle(&staged, frame) {
            HandlerVerdict::Confirmed => self.in_flight.mark_done(&staged.tup),
            HandlerVerdict::Rejected => self.in_flight.mark_failed(&staged.tup),
            HandlerVerdict::NeedMore => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use classifier_common::{ConnInfo, Staging};

    use super::*;

    struct Fixed(ProtocolId, HandlerVerdict);

    impl ProtocolHandler for Fixed {
        fn protocol(&self) -> ProtocolId {
            self.0
        }

        fn handle(&self, _staged: &PacketContext, _frame: &[u8]) -> HandlerVerdict {
            self.1
        }
    }

    #[test]
    fn empty_table_has_no_handlers() {
        let table = DispatchTable::builder().build();
        for protocol in ProtocolId::KNOWN {
            assert!(!table.is_registered(protocol));
        }
    }

    #[test]
    fn with_protocols_installs_only_requested() {
        let table = DispatchTable::with_protocols(&[ProtocolId::Http]);
        assert!(table.is_registered(ProtocolId::Http));
        assert!(!table.is_registered(ProtocolId::Tls));
        assert!(!table.is_registered(ProtocolId::Unknown));
    }

    #[test]
    fn unknown_handler_is_refused() {
        let table = DispatchTable::builder()
            .register(Arc::new(Fixed(ProtocolId::Unknown, HandlerVerdict::Confirmed)))
            .build();
        assert!(!table.is_registered(ProtocolId::Unknown));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let table = DispatchTable::builder()
            .register(Arc::new(TlsHandler))
            .register(Arc::new(Fixed(ProtocolId::Tls, HandlerVerdict::Rejected)))
            .build();
        let handler = table.handler(ProtocolId::Tls).unwrap();
        assert_eq!(
            handler.handle(&PacketContext::default(), &[]),
            HandlerVerdict::Rejected
        );
    }

    #[test]
    fn trampoline_applies_verdict_to_staged_tuple() {
        let table = DispatchTable::builder()
            .register(Arc::new(Fixed(ProtocolId::Http, HandlerVerdict::Rejected)))
            .build();
        let staging = StagingBuffer::new(1);
        let in_flight = InFlightTable::new(8);
        let staged = PacketContext {
            protocol: ProtocolId::Http as u8,
            ..PacketContext::default()
        };
        staging.stage(0, &staged).unwrap();

        let trampoline = Trampoline {
            table: &table,
            staging: &staging,
            in_flight: &in_flight,
        };
        assert_eq!(trampoline.dispatch(&[0u8; 0][..], 0, ProtocolId::Http), Ok(()));
        assert_eq!(
            in_flight.lookup(&staged.tup),
            Some(ConnInfo::FAILED)
        );

        assert_eq!(trampoline.dispatch(&[0u8; 0][..], 0, ProtocolId::Tls), Err(()));
    }

    #[test]
    fn trampoline_refuses_an_empty_slot() {
        let table = DispatchTable::builder()
            .register(Arc::new(Fixed(ProtocolId::Http, HandlerVerdict::Confirmed)))
            .build();
        let staging = StagingBuffer::new(2);
        let in_flight = InFlightTable::new(8);
        staging.stage(0, &PacketContext::default()).unwrap();

        let trampoline = Trampoline {
            table: &table,
            staging: &staging,
            in_flight: &in_flight,
        };
        assert_eq!(trampoline.dispatch(&[0u8; 0][..], 1, ProtocolId::Http), Err(()));
        assert!(in_flight.is_empty());
    }
}
