mod s3_upload_target;

pub use s3_upload_target::{S3Settings, S3UploadTarget};
