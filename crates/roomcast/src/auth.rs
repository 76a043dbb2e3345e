// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication collaborator: bearer token → identity.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::BrokerError;
use crate::model::Identity;

/// Verifies bearer credentials. Token issuance lives elsewhere.
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, BrokerError>;
}

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// One entry of the tokens file.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

/// Fixed token table, loaded from a JSON file at startup.
#[derive(Debug, Default)]
pub struct StaticTokens {
    entries: Vec<TokenEntry>,
}

impl StaticTokens {
    pub fn new(entries: Vec<TokenEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<TokenEntry> = serde_json::from_str(&contents)?;

        let mut seen = HashMap::new();
        for entry in &entries {
            if entry.token.is_empty() {
                anyhow::bail!("empty token for user {}", entry.user_id);
            }
            if let Some(prev) = seen.insert(entry.token.as_str(), entry.user_id.as_str()) {
                anyhow::bail!("token shared by users {prev} and {}", entry.user_id);
            }
        }
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Authenticator for StaticTokens {
    fn verify(&self, token: &str) -> Result<Identity, BrokerError> {
        // Compare against every entry so timing does not reveal the match index.
        let mut found = None;
        for entry in &self.entries {
            if constant_time_eq(&entry.token, token) && found.is_none() {
                found = Some(entry);
            }
        }
        found
            .map(|e| Identity { user_id: e.user_id.clone(), username: e.username.clone() })
            .ok_or(BrokerError::Unauthorized)
    }
}

/// Development authenticator: any non-empty token is its own user.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevAuth;

impl Authenticator for DevAuth {
    fn verify(&self, token: &str) -> Result<Identity, BrokerError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(BrokerError::Unauthorized);
        }
        Ok(Identity { user_id: token.to_owned(), username: token.to_owned() })
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
