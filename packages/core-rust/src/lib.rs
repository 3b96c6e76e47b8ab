//! Cumulus Core: service registry, multi-protocol router, dispatcher and wire codecs.

pub mod action;
pub mod codec;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod params;
pub mod protocol;
pub mod registry;
pub mod route;
pub mod router;

pub use action::{ActionTable, ServiceState};
pub use codec::{EncodedResponse, ProtocolCodec, ServedBy};
pub use descriptor::{
    JsonRpcSpec, OperationInput, ProtocolSpec, QueryRpcSpec, RestRoute, RestSpec,
    ServiceDescriptor, ServiceHandler,
};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, HandlerError, ProtocolError};
pub use gateway::Gateway;
pub use params::{PathParams, QueryParams};
pub use protocol::{JsonVersion, ProtocolKind};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use router::{InboundRequest, MatchKind, NoMatch, ResolvedRequest, Router};
