//! Snapshot reconciliation
//!
//! Each snapshot is a complete enumeration of connected users. One pass makes
//! the registry match it:
//! 1. create unknown ids, overwrite remote positions (the local entity keeps
//!    its own position once bound)
//! 2. destroy every entity the snapshot no longer lists
//! 3. bind the local entity to the reporter the first time it is seen
//!
//! The pass runs to completion inside one call, so no frame ever renders a
//! half-applied snapshot.

use crate::identity::IdentityResolver;
use crate::registry::EntityRegistry;
use crate::rendering::RenderSink;
use crate::reporter::MovementReporter;
use log::{debug, trace, warn};
use shared::{Snapshot, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: Vec<UserId>,
    pub updated: usize,
    pub removed: Vec<UserId>,
    /// Ids listed with an undecodable entry
    pub skipped: usize,
    pub bound_local: bool,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated == 0 && self.removed.is_empty()
    }
}

pub fn reconcile<S: RenderSink + ?Sized>(
    snapshot: &Snapshot,
    registry: &mut EntityRegistry,
    sink: &mut S,
    identity: &IdentityResolver,
    reporter: &mut MovementReporter,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        skipped: snapshot.malformed().count(),
        ..Default::default()
    };

    for (id, entry) in snapshot.entries() {
        if !registry.contains(id.as_str()) {
            registry.create(sink, id.clone(), entry.position, entry.color);
            summary.created.push(id.clone());
        } else if identity.is_local(id.as_str()) && reporter.is_bound() {
            // Local movement is authoritative between snapshots
            trace!(
                "Server places local entity at ({:.2}, {:.2}, {:.2}), keeping local position",
                entry.position.x,
                entry.position.y,
                entry.position.z
            );
        } else {
            registry.set_position(sink, id.as_str(), entry.position);
            summary.updated += 1;
        }
    }

    summary.removed = registry.retain(sink, |id| snapshot.contains(id.as_str()));
    if summary
        .removed
        .iter()
        .any(|id| identity.is_local(id.as_str()))
    {
        warn!("Snapshot no longer lists the local entity");
        reporter.unbind();
    }

    if let Some(local_id) = identity.local_id() {
        if !reporter.is_bound() && registry.contains(local_id.as_str()) {
            if let Some(entry) = snapshot.get(local_id.as_str()) {
                let position = reporter.bind(entry.position);
                registry.set_position(sink, local_id.as_str(), position);
                summary.bound_local = true;
                debug!("Bound local entity {}", local_id);
            }
        }
    }

    summary
}
