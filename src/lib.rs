//! Woof: walk tracking and bone-drop collection.
//!
//! A [`session::WalkSession`] turns noisy location samples into a distance
//! and duration; [`tracker::WalkTracker`] feeds it from a
//! [`location::LocationSource`] in real time. A [`proximity::ProximityEngine`]
//! shows the bone drops around a position and collects the one underfoot,
//! claiming it exactly once. [`rewards`] pays out walks and collections into
//! a wallet backed by an append-only ledger in [`storage`].

pub mod config;
pub mod geo;
pub mod geocode;
pub mod location;
pub mod model;
pub mod proximity;
pub mod rewards;
pub mod seed;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod user;
