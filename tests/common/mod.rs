//! Object store wrapper that fails selected operations on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOptions,
    PutOptions, PutPayload, PutResult, Result as ObjectStoreResult,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Delegates to an [`InMemory`] store unless a failure is armed
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<InMemory>,
    failing_list_prefix: Mutex<Option<String>>,
    failing_puts: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemory>) -> Self {
        Self {
            inner,
            failing_list_prefix: Mutex::new(None),
            failing_puts: AtomicBool::new(false),
        }
    }

    /// Fail listings whose prefix starts with `prefix`
    pub fn fail_list_under(&self, prefix: &str) {
        *self.failing_list_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn fail_puts(&self, fail: bool) {
        self.failing_puts.store(fail, Ordering::SeqCst);
    }

    fn list_fails(&self, prefix: Option<&ObjectPath>) -> bool {
        let armed = self.failing_list_prefix.lock().unwrap();
        match (armed.as_deref(), prefix) {
            (Some(armed), Some(prefix)) => prefix.as_ref().starts_with(armed),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

fn injected(what: &str) -> object_store::Error {
    object_store::Error::Generic {
        store: "FaultyStore",
        source: format!("injected {} failure", what).into(),
    }
}

impl fmt::Display for FaultyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultyStore({})", self.inner)
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put_opts(
        &self,
        location: &ObjectPath,
        payload: PutPayload,
        opts: PutOptions,
    ) -> ObjectStoreResult<PutResult> {
        if self.failing_puts.load(Ordering::SeqCst) {
            return Err(injected("put"));
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &ObjectPath,
        opts: PutMultipartOptions,
    ) -> ObjectStoreResult<Box<dyn MultipartUpload>> {
        if self.failing_puts.load(Ordering::SeqCst) {
            return Err(injected("multipart put"));
        }
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &ObjectPath, options: GetOptions) -> ObjectStoreResult<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &ObjectPath) -> ObjectStoreResult<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'static, ObjectStoreResult<ObjectMeta>> {
        if self.list_fails(prefix) {
            return stream::once(async { Err(injected("list")) }).boxed();
        }
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&ObjectPath>) -> ObjectStoreResult<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> ObjectStoreResult<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &ObjectPath, to: &ObjectPath) -> ObjectStoreResult<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}
