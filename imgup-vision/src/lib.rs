//! Image captions and tags for imgup.
//!
//! [`DescribeAdapter`] is the seam the server talks to; [`ComputerVisionClient`]
//! implements it against a Computer Vision `describe` endpoint, asking for a
//! single caption candidate in English.

mod client;
mod describe;
mod error;

pub use client::ComputerVisionClient;
pub use describe::{Caption, DescribeAdapter, Description};
pub use error::{DescribeError, DescribeResult};
