//! Client for the external radar-processing service.
//!
//! The service is a black box reached over HTTP: submit a processing
//! request, poll its status until terminal, download the raster
//! artifacts it produced. This crate provides the typed API client, the
//! status vocabulary mapping, the artifact decoder, and the poll
//! backoff policy. The [`service::ProcessingService`] trait is the seam
//! the worker is tested against.

pub mod api;
pub mod artifact;
pub mod backoff;
pub mod messages;
pub mod service;

pub use api::{InsarApi, InsarApiError};
pub use service::ProcessingService;
