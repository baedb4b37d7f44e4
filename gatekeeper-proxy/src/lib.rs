pub mod coordinator;
pub mod jwks;
pub mod smart_configuration;
pub mod state;

pub use coordinator::proxy_handler;
pub use jwks::JwksCache;
pub use smart_configuration::smart_configuration;
pub use state::AppState;
