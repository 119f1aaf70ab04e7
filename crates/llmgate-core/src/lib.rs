pub mod dispatch;
pub mod error;
pub mod handler;
pub mod router;
pub mod store;
pub mod upstream;

pub use dispatch::{DispatchReply, Dispatcher};
pub use error::GatewayError;
pub use handler::{AppState, ROUTE_OVERRIDE_HEADER, gateway_router};
pub use router::{RouteDecision, RouteError, select};
pub use store::{ConfigSource, ConfigStore};
pub use upstream::{
    UpstreamBody, UpstreamClient, UpstreamClientConfig, UpstreamError, UpstreamRequest,
    UpstreamResponse, WreqUpstreamClient,
};
