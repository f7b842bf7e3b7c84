//! Network path quality measurement against Cloudflare's speed test
//! endpoint: latency, jitter, download and upload throughput from
//! socket-level request timings.

pub mod cloudflare;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod measurements;
pub mod output;
pub mod results;
pub mod stats;
