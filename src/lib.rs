//! proofchain - a minimal proof-of-work ledger with longest-valid-chain consensus
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Block and chain model, canonical hashing, chain validation
//! - [`transaction`] - Transaction type and mining reward
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work predicate and cancellable nonce search
//! - [`sync`] - Longest-valid-chain resolution against peers
//!
//! ## Networking
//! - [`network`] - Registry of known peer nodes
//! - [`node`] - The synchronized ledger service
//! - `api` - HTTP transport (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;
pub mod sync;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
