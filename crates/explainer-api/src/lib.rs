pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use error::*;
pub use handlers::*;
pub use openapi::ApiDoc;
pub use routes::*;
pub use server::*;
pub use state::*;
