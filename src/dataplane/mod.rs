//! Data plane components
//!
//! Resolves how the destination is reached, then builds and transmits the
//! frames that carry each line.

pub mod connection;
pub mod frame;
pub mod interface;
pub mod neighbor;
pub mod routing;

pub use connection::{Connection, establish};
pub use frame::{Flow, MAX_PAYLOAD, build_frame};
pub use interface::{InterfaceAddr, InterfaceInfo};
pub use neighbor::{DISCOVERY_TIMEOUT, NeighborEntry, NeighborResolver, NeighborTable, Resolution};
pub use routing::{ResolvedRoute, Route, RoutingTable};
