//! Supallm client SDK.
//!
//! Triggers a remote flow and streams its execution events back over SSE,
//! reassembling streamed output fragments into a final result.
//!
//! ```ignore
//! use supallm::prelude::*;
//!
//! let client = SupallmClient::server(ClientConfig::from_env()?)?;
//! let response = client.run(RunFlowParams::new("flow-id").with_input("name", "John"))?;
//!
//! response.subscribe().on(EventKind::FlowResultFragment, |event| {
//!     if let FlowEvent::FlowResultFragment(fragment) = event {
//!         print!("{}", fragment.value);
//!     }
//! });
//! let outcome = response.wait().await?;
//! ```

pub mod accumulator;
pub mod adapters;
pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod prelude;
pub mod protocol;
pub mod reconciler;
pub mod response;
pub mod sse;
pub mod traits;
pub mod transport;

pub use client::{ClientAuth, RunFlowParams, SupallmClient};
pub use config::ClientConfig;
pub use response::{FlowOutcome, FlowResponse, FlowSubscription};
