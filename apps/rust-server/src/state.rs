// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{GatePolicy, TokenVerifier};
use crate::store::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    /// Bearer token verifier (owns the JWKS cache)
    pub verifier: Arc<TokenVerifier>,
    /// Application user accounts
    pub users: Arc<dyn UserDirectory>,
    /// Which paths skip authentication or the provisioning check
    pub gate: Arc<GatePolicy>,
}

impl AppState {
    pub fn new(verifier: TokenVerifier, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            users,
            gate: Arc::new(GatePolicy::default()),
        }
    }

    pub fn with_gate_policy(mut self, gate: GatePolicy) -> Self {
        self.gate = Arc::new(gate);
        self
    }
}
