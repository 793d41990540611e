use crate::config::ClientConfig;
use crate::identity::{Assignment, IdentityResolver};
use crate::input::PressedKeys;
use crate::reconciler::{reconcile, ReconcileSummary};
use crate::registry::EntityRegistry;
use crate::rendering::RenderSink;
use crate::reporter::MovementReporter;
use log::{debug, info, trace};
use shared::{decode_incoming, IdentitySource, Incoming, OutboundFraming, Position, Snapshot, UserId};

/// Everything that can change session state
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// One render frame with the keys held during it
    Tick(PressedKeys),
    InboundSnapshot(Snapshot),
    InboundIdentity { id: UserId, source: IdentitySource },
}

/// State for one connection: identity, entities, movement and the render sink
///
/// Events are applied one at a time through [`dispatch`](Self::dispatch), each
/// to completion, so the sink never observes a partially applied event.
pub struct SyncSession<S: RenderSink> {
    registry: EntityRegistry,
    identity: IdentityResolver,
    reporter: MovementReporter,
    sink: S,
    framing: OutboundFraming,
    last_summary: Option<ReconcileSummary>,
}

impl<S: RenderSink> SyncSession<S> {
    pub fn new(sink: S, config: &ClientConfig) -> Self {
        Self {
            registry: EntityRegistry::new(),
            identity: IdentityResolver::new(),
            reporter: MovementReporter::new(config.move_speed, config.report_epsilon),
            sink,
            framing: config.framing,
            last_summary: None,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn reporter(&self) -> &MovementReporter {
        &self.reporter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn last_summary(&self) -> Option<&ReconcileSummary> {
        self.last_summary.as_ref()
    }

    /// Position of the local entity once it is bound
    pub fn local_position(&self) -> Option<Position> {
        if !self.reporter.is_bound() {
            return None;
        }
        let local_id = self.identity.local_id()?;
        self.registry.get(local_id.as_str()).map(|entity| entity.position)
    }

    /// Applies one event, returning the framed outbound message it produced
    pub fn dispatch(&mut self, event: SyncEvent) -> Option<String> {
        match event {
            SyncEvent::Tick(keys) => self.handle_tick(&keys),
            SyncEvent::InboundIdentity { id, source } => self.handle_identity(id, source),
            SyncEvent::InboundSnapshot(snapshot) => {
                self.handle_snapshot(&snapshot);
                None
            }
        }
    }

    /// Decodes a raw transport message and dispatches what it carries
    pub fn handle_inbound(&mut self, raw: &str) -> Vec<String> {
        let mut outbound = Vec::new();

        for incoming in decode_incoming(raw) {
            let event = match incoming {
                Incoming::Identity { id, source } => SyncEvent::InboundIdentity { id, source },
                Incoming::Snapshot(snapshot) => SyncEvent::InboundSnapshot(snapshot),
                Incoming::Position(position) => {
                    trace!("Ignoring bare position message {:?}", position);
                    continue;
                }
                Incoming::Unrecognized => {
                    trace!("Ignoring unrecognized message ({} bytes)", raw.len());
                    continue;
                }
            };

            outbound.extend(self.dispatch(event));
        }

        outbound
    }

    fn handle_tick(&mut self, keys: &PressedKeys) -> Option<String> {
        let report = self.reporter.advance(keys);

        if self.reporter.is_bound() && !keys.is_empty() {
            if let Some(local_id) = self.identity.local_id() {
                self.registry
                    .set_position(&mut self.sink, local_id.as_str(), self.reporter.position());
            }
        }

        report.map(|text| self.framing.frame(text))
    }

    fn handle_identity(&mut self, id: UserId, source: IdentitySource) -> Option<String> {
        match self.identity.assign(id, source) {
            Assignment::Latched => {
                let report = self.reporter.initial_report();
                info!("Sending initial position report {}", report);
                Some(self.framing.frame(report))
            }
            Assignment::Repeated | Assignment::Conflicting | Assignment::Rejected => None,
        }
    }

    fn handle_snapshot(&mut self, snapshot: &Snapshot) {
        let summary = reconcile(
            snapshot,
            &mut self.registry,
            &mut self.sink,
            &self.identity,
            &mut self.reporter,
        );

        if !summary.is_noop() || summary.bound_local {
            debug!(
                "Snapshot applied: {} created, {} updated, {} removed, {} skipped",
                summary.created.len(),
                summary.updated,
                summary.removed.len(),
                summary.skipped
            );
        }

        self.last_summary = Some(summary);
    }

    /// Drops all connection state; the next connection starts from scratch
    pub fn reset_connection(&mut self) {
        let released = self.registry.clear(&mut self.sink);
        self.identity.reset();
        self.reporter.reset();
        self.last_summary = None;
        info!("Connection state reset, released {} entities", released);
    }

    /// Releases every visual and hands the sink back
    pub fn shutdown(mut self) -> S {
        let released = self.registry.clear(&mut self.sink);
        debug!("Session shut down, released {} entities", released);
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Direction;
    use crate::rendering::VisualHandle;
    use shared::{decode_snapshot, fragment, Color};

    #[derive(Default)]
    struct LiveSink {
        next: u64,
        live: usize,
    }

    impl RenderSink for LiveSink {
        fn create_entity_visual(&mut self, _id: &UserId, _color: Color) -> VisualHandle {
            self.next += 1;
            self.live += 1;
            VisualHandle::new(self.next)
        }

        fn set_position(&mut self, _handle: &VisualHandle, _position: Position) {}

        fn remove_entity_visual(&mut self, _handle: VisualHandle) {
            self.live -= 1;
        }
    }

    fn session() -> SyncSession<LiveSink> {
        SyncSession::new(LiveSink::default(), &ClientConfig::default())
    }

    fn identity(id: &str) -> SyncEvent {
        SyncEvent::InboundIdentity {
            id: UserId::from(id),
            source: IdentitySource::ElementSwap,
        }
    }

    fn snapshot(json: &str) -> SyncEvent {
        SyncEvent::InboundSnapshot(decode_snapshot(json).unwrap())
    }

    #[test]
    fn test_identity_emits_initial_report_once() {
        let mut session = session();

        assert_eq!(
            session.dispatch(identity("u1")).as_deref(),
            Some("POS:0.00,0.50,0.00")
        );
        assert_eq!(session.dispatch(identity("u1")), None);
        assert_eq!(session.dispatch(identity("u2")), None);
        assert_eq!(session.identity().local_id(), Some(&UserId::from("u1")));
    }

    #[test]
    fn test_ticks_before_binding_send_nothing() {
        let mut session = session();
        session.dispatch(identity("u1"));

        let keys = PressedKeys::none().with(Direction::Right);
        assert_eq!(session.dispatch(SyncEvent::Tick(keys)), None);
        assert!(session.local_position().is_none());
    }

    #[test]
    fn test_tick_moves_bound_entity_and_reports() {
        let mut session = session();
        session.dispatch(identity("u1"));
        session.dispatch(snapshot(r#"{"u1":{"position":"POS:0,0.5,0","color":1}}"#));

        let keys = PressedKeys::none().with(Direction::Down);
        let report = session.dispatch(SyncEvent::Tick(keys));

        assert_eq!(report.as_deref(), Some("POS:0.00,0.50,0.10"));
        let position = session.local_position().unwrap();
        assert!((position.z - 0.1).abs() < 1e-6);
        assert_eq!(session.dispatch(SyncEvent::Tick(PressedKeys::none())), None);
    }

    #[test]
    fn test_envelope_framing_applies_to_reports() {
        let config = ClientConfig {
            framing: OutboundFraming::FormEnvelope,
            ..ClientConfig::default()
        };
        let mut session = SyncSession::new(LiveSink::default(), &config);

        assert_eq!(
            session.dispatch(identity("u1")).as_deref(),
            Some(r#"{"msg":"POS:0.00,0.50,0.00"}"#)
        );
    }

    #[test]
    fn test_handle_inbound_identity_before_snapshot() {
        let mut session = session();
        let raw = format!(
            "{}{}",
            fragment::render_identity(&UserId::from("u1")),
            fragment::render_snapshot(r#"{"u1":{"position":"POS:1.00,0.50,0.00","color":255}}"#)
        );

        let outbound = session.handle_inbound(&raw);

        assert_eq!(outbound, vec!["POS:0.00,0.50,0.00".to_string()]);
        assert!(session.reporter().is_bound());
        assert_eq!(
            session.local_position(),
            Some(Position::new(1.0, 0.5, 0.0))
        );
        assert_eq!(session.last_summary().unwrap().created.len(), 1);
    }

    #[test]
    fn test_handle_inbound_ignores_noise() {
        let mut session = session();
        assert!(session.handle_inbound("<p>chat message</p>").is_empty());
        assert!(session.handle_inbound("POS:1.00,0.50,0.00").is_empty());
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_reset_connection_allows_new_identity() {
        let mut session = session();
        session.dispatch(identity("u1"));
        session.dispatch(snapshot(
            r#"{"u1":{"position":"POS:0,0.5,0"},"u2":{"position":"POS:1,0.5,0"}}"#,
        ));
        assert_eq!(session.sink().live, 2);

        session.reset_connection();

        assert!(session.registry().is_empty());
        assert_eq!(session.sink().live, 0);
        assert!(session.identity().local_id().is_none());
        assert_eq!(
            session.dispatch(identity("u9")).as_deref(),
            Some("POS:0.00,0.50,0.00")
        );
    }

    #[test]
    fn test_shutdown_releases_visuals() {
        let mut session = session();
        session.dispatch(snapshot(r#"{"a":{"position":"POS:0,0,0"}}"#));

        let sink = session.shutdown();
        assert_eq!(sink.live, 0);
    }
}
