//! # image-dispatch
//!
//! A distributed Gaussian-convolution image filter dispatch system: a
//! coordinator ("master") that receives image-filter jobs from client
//! submitters and distributes them across a dynamic pool of registered
//! worker nodes ("slaves"), each running a multi-pass Gaussian convolution
//! pipeline over pixel data.
//!
//! The crate is organized around the three node roles that share one wire
//! protocol:
//!
//! - [`transport`] — the framed TCP transport every role dials or accepts
//!   over.
//! - [`model`] — the payload bodies carried inside a transport message.
//! - [`master`] — the dispatch core: worker registry, selection policy,
//!   pending-request correlation, statistics.
//! - [`filter`] — the Gaussian convolution pipeline a worker runs on
//!   decoded pixel data.
//! - [`worker`] and [`client`] — the process loops for the other two roles,
//!   built on top of the above.

pub mod cli;
pub mod client;
pub mod error;
pub mod filter;
pub mod logging;
pub mod master;
pub mod model;
pub mod transport;
pub mod worker;

/// The current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
