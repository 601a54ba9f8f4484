pub mod compiler;
pub mod definition;
pub mod params;

pub use compiler::{compile, Endpoint, HandlerBinding, HandlerFn, RestApi, RouteMounter, RoutingTable};
pub use definition::{HttpMethod, MediaType, RouteDefinition};
pub use params::{ParamSource, ParameterSpec, TargetType};
