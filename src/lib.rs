//! aria2-relay core library
//!
//! Watches network exchanges inside a host application, decides which
//! responses represent downloadable content, extracts file metadata from
//! protocol headers, and hands the job to an aria2 daemon over JSON-RPC —
//! retrying once and falling back to the host's direct-download path on
//! failure.
//!
//! # Architecture
//!
//! - [`observer`] - request/response correlation by request identifier
//! - [`filter`] - synchronous capture decision (site/extension/size filters,
//!   gesture bypass, content classification)
//! - [`metadata`] - filename/size derivation from response headers
//! - [`rpc`] - dual-mode JSON-RPC 2.0 client (WebSocket channel or HTTP
//!   per-call)
//! - [`dispatch`] - profile resolution, retry, and fallback orchestration
//! - [`relay`] - the host-facing context tying the pipeline together
//! - [`config`] - stored settings behind the host key-value store
//! - [`host`] - collaborator traits the embedding host implements

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod filter;
pub mod headers;
pub mod host;
pub mod metadata;
pub mod observer;
pub mod relay;
pub mod rpc;

// Re-export commonly used types
pub use config::{DispatchPrefs, Protocol, ServerProfile, SettingsStore};
pub use dispatch::{DispatchCoordinator, DispatchJob, DispatchOutcome, RETRY_DELAY};
pub use filter::{Decision, FilterConfig, FilterMode, GestureBypass, WildcardPattern};
pub use headers::Header;
pub use host::{DirectDownload, HostActions, PanelRequest};
pub use observer::{CaptureRecord, NetworkObserver, RequestEvent, ResponseEvent};
pub use relay::Relay;
pub use rpc::{Aria2Client, CallTransport, ChannelTransport, RpcError, RpcTransport};
