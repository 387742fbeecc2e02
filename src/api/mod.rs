//! Authenticated HTTP dispatch

pub mod client;

pub use client::{AuthHttp, Request};
