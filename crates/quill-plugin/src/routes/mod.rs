//! Module/route bridge: plugin routes over a transport-neutral request/response pair.

pub mod bridge;
pub mod request;
pub mod settings;

pub use bridge::{MountedRouteInfo, RouteBridge, RouteDefinition, RouteHandler, RoutePattern};
pub use request::{BufferedResponse, Method, PluginRequest, PluginResponse, ResponseBody};
pub use settings::SETTINGS_PATH;
