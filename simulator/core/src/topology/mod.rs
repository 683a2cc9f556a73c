pub mod parse;
pub mod plan;

pub use parse::{TopologyParseError, TopologyParser, parse_topology, parse_topology_strict};
pub use plan::{ConnectionPlan, Edge, EdgeKind, PlanError};
