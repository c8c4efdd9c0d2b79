//! Domain types.
//!
//! Everything here is a snapshot of remote-owned data or derived from one.
//! Nothing is cached between calls; every read fetches fresh.

pub mod customer;
pub mod definition;
pub mod gateway;
pub mod server;

pub use customer::{CreditLimit, Customer};
pub use definition::VirtualNumberDefinition;
pub use gateway::{
    fields, GatewayKind, GatewayPatch, GatewayRecord, MappingGateway, Payload, RawRecord,
    RoutingGateway,
};
pub use server::{ServerEndpoint, ServerRegistry};
