//! Hookstream Server
//!
//! Self-hosted webhook relay: provider-specific adapters verify and
//! normalize inbound webhooks, and per-endpoint hubs fan the events out to
//! live WebSocket/SSE subscribers.

pub mod adapters;
pub mod api;
pub mod config;
pub mod event;
pub mod hub;
pub mod ingress;
pub mod observability;
pub mod store;
