//! Correction searches for predicted ranks.
//!
//! A position oracle turns a key into an [`Estimate`]: an approximate rank
//! plus a maximum error. The searches in this crate resolve that estimate
//! into an exact rank over a [`KeyStore`](rankprobe_store::KeyStore):
//!
//! - [`Strategy::BoundedBinary`]: lower-bound binary search over the
//!   [`CorrectionWindow`] implied by the estimate
//! - [`Strategy::BoundedLinear`]: scan outward from the approximate rank,
//!   never leaving the window
//! - [`Strategy::FullBinary`]: ignore the estimate and search everything
//!
//! All of them are pure functions of their inputs. A key whose true rank
//! lies outside the window resolves to [`RankResult::NotFound`] rather than
//! an error.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod strategy;
mod window;

pub use rankprobe_store::RankResult;
pub use strategy::{Strategy, UnknownStrategy, bounded_binary, bounded_linear, full_binary};
pub use window::{CorrectionWindow, Estimate};
