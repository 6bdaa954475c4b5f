//! In-memory upload target shared by the unit tests

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::backpressure::{BucketName, GuardError, ObjectName, Result};
use crate::ports::UploadTarget;

#[derive(Clone, Default)]
pub(crate) struct InMemoryTarget {
    buckets: Arc<Mutex<Vec<String>>>,
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    uploads: Arc<Mutex<Vec<String>>>,
    fail_on: Arc<Mutex<Option<String>>>,
    upload_delay: Duration,
}

impl InMemoryTarget {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every upload take `delay` on the runtime clock
    pub(crate) fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Reject the upload of `object` until `clear_failure` is called
    pub(crate) fn fail_on(&self, object: &str) {
        *self.fail_on.lock().unwrap() = Some(object.to_string());
    }

    pub(crate) fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub(crate) fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    /// Object names in upload order
    pub(crate) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn put_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub(crate) fn buckets(&self) -> Vec<String> {
        self.buckets.lock().unwrap().clone()
    }
}

impl UploadTarget for InMemoryTarget {
    fn create_bucket_if_absent(&self, bucket: &BucketName) -> impl Future<Output = Result<()>> + Send {
        let buckets = self.buckets.clone();
        let bucket = bucket.to_string();

        async move {
            let mut buckets = buckets.lock().unwrap();
            if !buckets.contains(&bucket) {
                buckets.push(bucket);
            }
            Ok(())
        }
    }

    fn put_object(
        &self,
        _bucket: &BucketName,
        object: &ObjectName,
        path: &Path,
    ) -> impl Future<Output = Result<u64>> + Send {
        let objects = self.objects.clone();
        let uploads = self.uploads.clone();
        let fail_on = self.fail_on.clone();
        let delay = self.upload_delay;
        let object = object.to_string();
        let path = path.to_path_buf();

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail_on.lock().unwrap().as_deref() == Some(object.as_str()) {
                return Err(GuardError::upload(format!("rejected {}", object)));
            }
            let data = std::fs::read(&path).map_err(|err| GuardError::upload(err.to_string()))?;
            let size = data.len() as u64;
            objects.lock().unwrap().insert(object.clone(), Bytes::from(data));
            uploads.lock().unwrap().push(object);
            Ok(size)
        }
    }
}
