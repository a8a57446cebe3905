//! `gatekeeper-api` — service binary wiring.
//!
//! Environment configuration, store bring-up and the health surface. The
//! conversational transport that drives the engine is a deployment-provided
//! collaborator behind the [`gatekeeper_engine::Notifier`] seam.

pub mod app;
pub mod config;
pub mod notifier;
