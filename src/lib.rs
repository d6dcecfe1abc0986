//! OmniBiz Backend Library
//!
//! This library exports the core modules for the OmniBiz backend server:
//! the wallet ledger, the messaging store, and the realtime fan-out layer
//! they publish into.

pub mod app_state;
pub mod cache;
pub mod handlers;
pub mod messaging;
pub mod models;
pub mod routes;
pub mod wallet;
pub mod websocket;
