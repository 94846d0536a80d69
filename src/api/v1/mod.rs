mod error;
mod handler;
mod router;

pub use error::*;
pub use handler::ApiResponse;
pub use router::routes;
