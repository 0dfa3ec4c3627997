// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Entrenar - Gym Tracking API Server
//!
//! Every route except the health check sits behind an authorization gate
//! that verifies Supabase-issued JWTs against the provider's JWKS.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification and the authorization gate
//! - `config` - Environment configuration
//! - `store` - User accounts

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
