//! S3 adapter for dumpguard
//!
//! Implements the domain `UploadTarget` port on top of `aws-sdk-s3`. Works
//! against AWS and S3-compatible stores such as MinIO.

pub mod infrastructure;

pub use infrastructure::{S3Settings, S3UploadTarget};
