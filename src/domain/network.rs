//! `wpa_supplicant` network set.
//!
//! `ADD_NETWORK` assigns an integer id asynchronously, and callers may
//! queue configuration or a removal before that id arrives. A network is
//! therefore a tagged variant: [`Network::Pending`] (no id yet, carries a
//! `createseq` and the mutations queued against it) or [`Network::Born`]
//! (a real id). The oldest `Pending` entry pairs with the next
//! `ADD_NETWORK` reply — `createseq` gives that ordering a total order
//! even if several pending creations are in flight at once.

/// Station / AP / mesh mode, as `wpa_supplicant` encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    Station = 0,
    Ap = 2,
    Mesh = 5,
}

/// A queued configuration mutation, applied once the network is born.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Set { key: String, value: String },
    Remove,
    Enable,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkFlags {
    pub disabled: bool,
    pub selected_pending: bool,
    pub remove_pending: bool,
}

/// A configured network, either awaiting its `ADD_NETWORK` id or born.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Pending {
        createseq: u64,
        ssid: String,
        mode: NetworkModeTag,
        flags: NetworkFlagsTag,
        pending_ops: Vec<PendingOp>,
    },
    Born {
        id: i64,
        ssid: String,
        mode: NetworkModeTag,
        flags: NetworkFlagsTag,
    },
}

pub type NetworkModeTag = NetworkMode;
pub type NetworkFlagsTag = NetworkFlags;

impl Network {
    pub fn ssid(&self) -> &str {
        match self {
            Network::Pending { ssid, .. } => ssid,
            Network::Born { ssid, .. } => ssid,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Network::Pending { .. } => -1,
            Network::Born { id, .. } => *id,
        }
    }

    pub fn mode(&self) -> NetworkMode {
        match self {
            Network::Pending { mode, .. } => *mode,
            Network::Born { mode, .. } => *mode,
        }
    }
}

/// The full set of configured networks, sorted by SSID for binary search.
#[derive(Debug, Default)]
pub struct NetworkSet {
    networks: Vec<Network>,
    next_createseq: u64,
}

impl NetworkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin creating a network: append a `Pending` entry and return its
    /// `createseq` for correlation.
    pub fn begin_create(&mut self, ssid: impl Into<String>, mode: NetworkMode) -> u64 {
        let createseq = self.next_createseq;
        self.next_createseq += 1;
        self.networks.push(Network::Pending {
            createseq,
            ssid: ssid.into(),
            mode,
            flags: NetworkFlags::default(),
            pending_ops: Vec::new(),
        });
        self.sort();
        createseq
    }

    /// Queue a mutation against an SSID that may still be pending.
    /// Returns `false` if no network with that SSID exists at all.
    pub fn queue_pending_op(&mut self, ssid: &str, op: PendingOp) -> bool {
        for n in &mut self.networks {
            if n.ssid() == ssid {
                if let Network::Pending { pending_ops, .. } = n {
                    pending_ops.push(op);
                    return true;
                }
                return false; // already born; caller should apply directly
            }
        }
        false
    }

    /// Transform the oldest `Pending` entry into `Born` with `id`,
    /// draining its queued operations in order (caller applies them
    /// against the transport/domain state; this just returns them).
    pub fn assign_id(&mut self, id: i64) -> Option<(String, Vec<PendingOp>)> {
        let idx = self
            .networks
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, Network::Pending { .. }))
            .min_by_key(|(_, n)| match n {
                Network::Pending { createseq, .. } => *createseq,
                _ => unreachable!(),
            })
            .map(|(i, _)| i)?;

        let Network::Pending {
            ssid,
            mode,
            flags,
            pending_ops,
            ..
        } = self.networks.remove(idx)
        else {
            unreachable!()
        };

        self.networks.push(Network::Born {
            id,
            ssid: ssid.clone(),
            mode,
            flags,
        });
        self.sort();
        Some((ssid, pending_ops))
    }

    pub fn remove_by_ssid(&mut self, ssid: &str) -> Option<Network> {
        let idx = self.networks.iter().position(|n| n.ssid() == ssid)?;
        Some(self.networks.remove(idx))
    }

    pub fn by_ssid(&self, ssid: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.ssid() == ssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    /// Highest-id network of the given mode, for `lastAP`/`lastmesh`.
    pub fn highest_id_of_mode(&self, mode: NetworkMode) -> Option<&Network> {
        self.networks
            .iter()
            .filter(|n| n.mode() == mode && n.id() >= 0)
            .max_by_key(|n| n.id())
    }

    fn sort(&mut self) {
        self.networks
            .sort_by(|a, b| a.ssid().cmp(b.ssid()));
    }
}
