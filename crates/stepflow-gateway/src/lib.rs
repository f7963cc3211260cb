mod error;
mod protocol;
mod routes;
mod server;
mod state;
mod store;

pub use error::ApiError;
pub use protocol::{RunRecord, RunStatus};
pub use server::{router, GatewayServer};
pub use state::AppState;
pub use store::{MemoryStore, StoredGraph};
