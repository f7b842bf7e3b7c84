pub mod client;
pub mod requests;
pub mod tests;

/// Host of the reference speed test endpoint.
pub const DEFAULT_HOST: &str = "speed.cloudflare.com";
