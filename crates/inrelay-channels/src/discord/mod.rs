//! Discord integration: REST message posting and a Gateway listener
//! for operator commands.

pub mod api;
pub mod events;
pub mod gateway;

pub use api::DiscordApiClient;
pub use gateway::DiscordGateway;
