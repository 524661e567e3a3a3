//! Furniture storefront library.
//!
//! Two halves share this crate:
//!
//! - [`client`]: the storefront client layer (session token, API gateway,
//!   cart, auth, wishlist, checkout) that talks to the Store-API through the
//!   relay.
//! - [`routes`] and friends: the same-origin relay service that forwards
//!   `/api/shopware/*` to the Store-API with the sales channel access key.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod shopware;
pub mod state;
pub mod storage;
