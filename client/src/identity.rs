use log::{info, trace, warn};
use shared::{IdentitySource, UserId};

/// Outcome of offering a candidate id to the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// First id of this connection; the caller owes the initial report
    Latched,
    /// Same id delivered again
    Repeated,
    /// A different id after one was latched; ignored
    Conflicting,
    /// Empty candidate
    Rejected,
}

/// Write-once latch for the local user's id
///
/// The server may announce identity through more than one channel, or more
/// than once. Only the first non-empty id sticks until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct IdentityResolver {
    local_id: Option<UserId>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_id(&self) -> Option<&UserId> {
        self.local_id.as_ref()
    }

    pub fn is_local(&self, id: &str) -> bool {
        self.local_id.as_ref().map_or(false, |local| local.as_str() == id)
    }

    pub fn assign(&mut self, candidate: UserId, source: IdentitySource) -> Assignment {
        if candidate.as_str().trim().is_empty() {
            return Assignment::Rejected;
        }

        match &self.local_id {
            None => {
                info!("Local client id {} assigned via {:?}", candidate, source);
                self.local_id = Some(candidate);
                Assignment::Latched
            }
            Some(current) if *current == candidate => {
                trace!("Client id {} delivered again via {:?}", candidate, source);
                Assignment::Repeated
            }
            Some(current) => {
                warn!(
                    "Ignoring client id {} via {:?}, already latched {}",
                    candidate, source, current
                );
                Assignment::Conflicting
            }
        }
    }

    /// Forgets the latched id so a new connection can assign one
    pub fn reset(&mut self) {
        if let Some(previous) = self.local_id.take() {
            info!("Cleared local client id {}", previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_assignment_latches() {
        let mut identity = IdentityResolver::new();
        assert!(identity.local_id().is_none());

        let outcome = identity.assign(UserId::from("u1"), IdentitySource::InlineMessage);

        assert_eq!(outcome, Assignment::Latched);
        assert_eq!(identity.local_id(), Some(&UserId::from("u1")));
        assert!(identity.is_local("u1"));
        assert!(!identity.is_local("u2"));
    }

    #[test]
    fn test_repeated_assignment_is_noop() {
        let mut identity = IdentityResolver::new();
        identity.assign(UserId::from("u1"), IdentitySource::ElementSwap);

        let outcome = identity.assign(UserId::from("u1"), IdentitySource::InlineMessage);

        assert_eq!(outcome, Assignment::Repeated);
        assert_eq!(identity.local_id(), Some(&UserId::from("u1")));
    }

    #[test]
    fn test_conflicting_assignment_keeps_first() {
        let mut identity = IdentityResolver::new();
        identity.assign(UserId::from("u1"), IdentitySource::InlineMessage);

        let outcome = identity.assign(UserId::from("u2"), IdentitySource::ElementSwap);

        assert_eq!(outcome, Assignment::Conflicting);
        assert_eq!(identity.local_id(), Some(&UserId::from("u1")));
    }

    #[test]
    fn test_empty_candidate_rejected() {
        let mut identity = IdentityResolver::new();
        assert_eq!(
            identity.assign(UserId::from("  "), IdentitySource::ElementSwap),
            Assignment::Rejected
        );
        assert!(identity.local_id().is_none());
    }

    #[test]
    fn test_reset_allows_new_latch() {
        let mut identity = IdentityResolver::new();
        identity.assign(UserId::from("u1"), IdentitySource::InlineMessage);
        identity.reset();

        let outcome = identity.assign(UserId::from("u2"), IdentitySource::InlineMessage);

        assert_eq!(outcome, Assignment::Latched);
        assert_eq!(identity.local_id(), Some(&UserId::from("u2")));
    }
}
