pub mod headers;
pub mod http;
pub mod metacritic;
pub mod steam;
pub mod turnbasedlovers;

pub use headers::{HeaderProfile, HeaderRotation};
pub use http::HttpClient;
