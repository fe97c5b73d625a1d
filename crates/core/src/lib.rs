//! Atelier Core - Domain types and marketplace rules.
//!
//! This crate provides the types shared by every Atelier component:
//! - `api` - JSON API service (repositories, services, routes)
//! - `cli` - Command-line tools for migrations, accounts and ledger audits
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. State transitions, commission arithmetic and ledger folds
//! live here so they can be tested without a database and reused by every
//! caller.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, statuses and profiles
//! - [`commission`] - Per-item commission and order totals
//! - [`ledger`] - Signed ledger entries and balance folds
//! - [`pagination`] - Limit/offset page requests

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod commission;
pub mod ledger;
pub mod pagination;
pub mod types;

pub use commission::{CommissionRate, CommissionRateError, ItemPricing, OrderTotals};
pub use ledger::{LedgerEntry, LedgerError};
pub use pagination::{Page, PageRequest};
pub use types::*;
