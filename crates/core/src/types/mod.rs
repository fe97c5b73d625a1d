//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod profile;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError, Quantity, QuantityError};
pub use profile::{ArtistDetails, ProfileError, RoleProfile, StoreDetails};
pub use rating::{Rating, RatingError};
pub use status::*;
