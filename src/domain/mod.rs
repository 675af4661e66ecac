//! Domain model: typed state entities the dispatcher mutates and the
//! publisher reads — operators, networks, BSSes, and derived scalar
//! properties.

pub mod bss;
pub mod derived;
pub mod network;
pub mod operator;

pub use bss::{Bss, BssFlags, BssSet};
pub use derived::{PropertyCache, Source};
pub use network::{Network, NetworkMode, NetworkSet, PendingOp};
pub use operator::{OperatorEntry, OperatorTable};
