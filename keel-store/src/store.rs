//! Store handle
//!
//! [`Store`] owns the backend and hands out one [`Engine`] per entity. All
//! engines share the backend's pool, the codec settings and the deadline.

use std::sync::Arc;
use std::time::Duration;

use keel_core::domain::{Build, Pipeline, Secret, Service};

use crate::backend::{Backend, Dialect};
use crate::codec::{Codec, Entity};
use crate::repository::Engine;

#[derive(Debug, Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
    codec: Codec,
    timeout: Duration,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>, codec: Codec, timeout: Duration) -> Self {
        Self {
            backend,
            codec,
            timeout,
        }
    }

    /// Copy of this store whose operations run under `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn engine<E: Entity>(&self) -> Engine<E> {
        Engine::new(Arc::clone(&self.backend), self.codec, self.timeout)
    }

    pub fn builds(&self) -> Engine<Build> {
        self.engine()
    }

    pub fn pipelines(&self) -> Engine<Pipeline> {
        self.engine()
    }

    pub fn secrets(&self) -> Engine<Secret> {
        self.engine()
    }

    pub fn services(&self) -> Engine<Service> {
        self.engine()
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}
