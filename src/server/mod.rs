pub mod handlers;
pub mod protocol;
pub mod response;
mod router;

pub use router::{AppState, create_router};
