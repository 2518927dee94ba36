// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Meetly Auth - Authentication and Identity Confirmation Service
//!
//! Credential and Google sign-in, stateless HS256 session tokens, and a
//! two-phase email confirmation handshake backed by a short-lived ledger.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens, password hashing, bearer extractor
//! - `service` - Auth orchestrator composing the pieces below
//! - `storage` - Credential store (in-memory or embedded redb)
//! - `ledger` - Short-lived key-value ledger (in-memory or Redis)
//! - `providers` - External identity providers (Google OAuth)
//! - `email` - Fire-and-forget email intents and the mail relay

pub mod api;
pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod service;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;
