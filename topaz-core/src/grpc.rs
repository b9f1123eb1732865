//! # Generic gRPC Transport
//!
//! This module contains the low-level building blocks for performing gRPC calls with
//! dynamic message types.
//!
//! Unlike standard `tonic` clients which are strongly typed (e.g., `GetObjectRequest`),
//! the components here work with `prost_reflect::DynamicMessage`, whose schema is looked up
//! at runtime in the bundled descriptor pool.
pub mod client;
pub mod codec;
