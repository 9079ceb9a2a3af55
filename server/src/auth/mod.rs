//! Authentication for publish endpoints.

mod middleware;

pub use middleware::Publisher;
