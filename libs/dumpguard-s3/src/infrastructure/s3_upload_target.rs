//! S3 Upload Target Implementation
//!
//! This module implements the `UploadTarget` trait using AWS S3 as the backend.
//! It handles all S3 operations and converts AWS errors to domain errors.

use std::future::Future;
use std::path::Path;

use aws_sdk_s3::{
    config::Region,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};
use dumpguard_domain::{
    backpressure::{BucketName, GuardError, ObjectName, Result},
    ports::UploadTarget,
};
use tracing::{debug, error, info, info_span, Instrument};

/// Region S3 treats as the default; it must not be sent as a location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for the S3 client
///
/// Credentials are not part of the settings: they come from the standard
/// AWS provider chain (environment, profile, instance metadata).
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// Custom endpoint, e.g. a MinIO server
    pub endpoint: Option<String>,
    /// Region override; falls back to the provider chain
    pub region: Option<String>,
    /// Path-style addressing, required by MinIO
    pub force_path_style: bool,
}

/// S3-based implementation of the UploadTarget port
///
/// Every drained file becomes one object at the root of the run's bucket.
///
/// ## Error Handling
///
/// All AWS SDK errors are converted to `GuardError::Upload` with the full
/// error context for debugging.
#[derive(Clone)]
pub struct S3UploadTarget {
    client: Client,
}

impl S3UploadTarget {
    /// Create a new upload target from a configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from `settings` and the AWS environment
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use dumpguard_s3::{S3Settings, S3UploadTarget};
    ///
    /// # async fn example() {
    /// let settings = S3Settings {
    ///     endpoint: Some("http://localhost:9000".to_string()),
    ///     region: Some("us-east-1".to_string()),
    ///     force_path_style: true,
    /// };
    /// let target = S3UploadTarget::connect(&settings).await;
    /// # }
    /// ```
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(settings.force_path_style)
            .build();

        info!(
            endpoint = settings.endpoint.as_deref().unwrap_or("default"),
            region = aws_config.region().map(|r| r.as_ref()).unwrap_or("unset"),
            force_path_style = settings.force_path_style,
            "Initializing S3UploadTarget"
        );

        Self::new(Client::from_conf(s3_config))
    }

    /// Region the client is configured for, if any
    pub fn region(&self) -> Option<&str> {
        self.client.config().region().map(|r| r.as_ref())
    }
}

/// Location constraint to send when creating a bucket in `region`
fn location_constraint(region: Option<&str>) -> Option<CreateBucketConfiguration> {
    region.filter(|r| *r != DEFAULT_REGION).map(|r| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(r))
            .build()
    })
}

impl UploadTarget for S3UploadTarget {
    fn create_bucket_if_absent(
        &self,
        bucket: &BucketName,
    ) -> impl Future<Output = Result<()>> + Send {
        let client = self.client.clone();
        let configuration = location_constraint(self.region());
        let bucket = bucket.to_string();
        let span = info_span!("create_bucket", bucket = %bucket);

        async move {
            debug!("Creating bucket");

            match client
                .create_bucket()
                .bucket(&bucket)
                .set_create_bucket_configuration(configuration)
                .send()
                .await
            {
                Ok(_) => {
                    info!(bucket = %bucket, "Successfully created bucket");
                    Ok(())
                }
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
                {
                    info!(bucket = %bucket, "Bucket already owned by us");
                    Ok(())
                }
                Err(err) => {
                    error!(bucket = %bucket, error = %DisplayErrorContext(&err), "Failed to create bucket");
                    Err(GuardError::upload(format!(
                        "S3 create_bucket failed for '{}': {}",
                        bucket,
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
        .instrument(span)
    }

    fn put_object(
        &self,
        bucket: &BucketName,
        object: &ObjectName,
        path: &Path,
    ) -> impl Future<Output = Result<u64>> + Send {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = object.to_string();
        let path = path.to_path_buf();
        let span = info_span!("put_object", bucket = %bucket, key = %key);

        async move {
            let read_failure = |err: &dyn std::fmt::Display| {
                GuardError::upload(format!("Failed to read '{}': {}", path.display(), err))
            };

            let size = tokio::fs::metadata(&path)
                .await
                .map_err(|err| read_failure(&err))?
                .len();
            let body = ByteStream::from_path(&path)
                .await
                .map_err(|err| read_failure(&err))?;

            debug!(size, "Uploading object");

            match client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_length(size as i64)
                .body(body)
                .send()
                .await
            {
                Ok(_) => {
                    info!(key = %key, size, "Successfully uploaded object");
                    Ok(size)
                }
                Err(err) => {
                    error!(key = %key, error = %DisplayErrorContext(&err), "Failed to upload object");
                    Err(GuardError::upload(format!(
                        "S3 put_object failed for key '{}': {}",
                        key,
                        DisplayErrorContext(&err)
                    )))
                }
            }
        }
        .instrument(span)
    }
}
