//! Request generations: one monotonically increasing counter per fetch kind.
//!
//! Responses can land in any order. A completion is applied only when its
//! generation is still the newest one issued for its kind; anything older has
//! been superseded and is dropped.
//!
//! The table also counts requests still on the wire, so a periodic tick can
//! leave a kind alone until its previous request has answered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Status,
    Nodes,
    Links,
    Neighbors,
}

impl FetchKind {
    pub const ALL: [FetchKind; 4] = [
        FetchKind::Status,
        FetchKind::Nodes,
        FetchKind::Links,
        FetchKind::Neighbors,
    ];

    fn index(self) -> usize {
        match self {
            FetchKind::Status => 0,
            FetchKind::Nodes => 1,
            FetchKind::Links => 2,
            FetchKind::Neighbors => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::Status => "discovery status",
            FetchKind::Nodes => "nodes",
            FetchKind::Links => "links",
            FetchKind::Neighbors => "neighbors",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag carried by an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    pub kind: FetchKind,
    pub value: u64,
}

#[derive(Debug, Default)]
pub struct RequestGenerations {
    latest: [u64; 4],
    pending: [u32; 4],
}

impl RequestGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, kind: FetchKind) -> Generation {
        let slot = &mut self.latest[kind.index()];
        *slot += 1;
        self.pending[kind.index()] += 1;
        Generation {
            kind,
            value: *slot,
        }
    }

    /// Mark a request as answered. Returns whether its reply should be applied.
    pub fn complete(&mut self, generation: Generation) -> bool {
        let pending = &mut self.pending[generation.kind.index()];
        *pending = pending.saturating_sub(1);
        self.is_current(generation)
    }

    /// A request of this kind has been issued and not yet answered.
    pub fn in_flight(&self, kind: FetchKind) -> bool {
        self.pending[kind.index()] > 0
    }

    /// Forget outstanding requests whose completions will never arrive.
    pub fn clear_pending(&mut self) {
        self.pending = [0; 4];
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest[generation.kind.index()] == generation.value
    }

    pub fn latest(&self, kind: FetchKind) -> u64 {
        self.latest[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_issue_supersedes_older() {
        let mut gens = RequestGenerations::new();
        let first = gens.issue(FetchKind::Links);
        assert!(gens.is_current(first));
        let second = gens.issue(FetchKind::Links);
        assert!(!gens.is_current(first));
        assert!(gens.is_current(second));
        assert_eq!(gens.latest(FetchKind::Links), 2);
    }

    #[test]
    fn in_flight_until_every_request_completes() {
        let mut gens = RequestGenerations::new();
        assert!(!gens.in_flight(FetchKind::Links));
        let tick = gens.issue(FetchKind::Links);
        let refetch = gens.issue(FetchKind::Links);
        assert!(gens.in_flight(FetchKind::Links));
        assert!(!gens.in_flight(FetchKind::Nodes));

        assert!(gens.complete(refetch));
        assert!(gens.in_flight(FetchKind::Links));
        assert!(!gens.complete(tick));
        assert!(!gens.in_flight(FetchKind::Links));
    }

    #[test]
    fn clear_pending_frees_every_kind() {
        let mut gens = RequestGenerations::new();
        for kind in FetchKind::ALL {
            gens.issue(kind);
        }
        gens.clear_pending();
        assert!(FetchKind::ALL.iter().all(|k| !gens.in_flight(*k)));
        assert_eq!(gens.latest(FetchKind::Status), 1);
    }

    #[test]
    fn kinds_are_independent() {
        let mut gens = RequestGenerations::new();
        let nodes = gens.issue(FetchKind::Nodes);
        for kind in FetchKind::ALL {
            if kind != FetchKind::Nodes {
                gens.issue(kind);
            }
        }
        assert!(gens.is_current(nodes));
        assert_eq!(gens.latest(FetchKind::Status), 1);
    }
}
