//! Polling client for the Vercel API: an authenticated fetcher that keeps
//! per-team deployments and projects fresh and pushes every change to
//! subscribers.

pub mod app;
pub mod config;
pub mod domain;
pub mod events;
pub mod fetcher;
pub mod poller;
pub mod state;
pub mod storage;
pub mod store;
#[cfg(test)]
mod test_support;
pub mod vercel;
