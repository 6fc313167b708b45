//! Backend access: the [`GraphApi`] seam and its HTTP implementation.

mod client;

pub use client::{GraphApi, HttpGraphApi, IndexAccepted};
