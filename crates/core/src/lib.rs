//! Furniture Core - Shared types library.
//!
//! This crate provides the types shared by the storefront client layer and
//! the relay service:
//! - `storefront` - client-side cart/auth/wishlist managers and the relay binary
//! - `integration-tests` - end-to-end scenarios driven through the relay
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for backend ids, the session token, prices,
//!   emails, and identity status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
