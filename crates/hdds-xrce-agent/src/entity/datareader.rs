// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::Arc;
use std::time::Duration;

use super::MiddlewareHandle;
use crate::error::XrceError;
use crate::middleware::{DataListener, Middleware};
use crate::object::ObjectId;
use crate::reader::{DeliveryControl, DeliveryGate, RateControlledReader, SampleSource};

/// How delivered samples are framed towards the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    Data,
    Sample,
    DataSeq,
    SampleSeq,
    PackedSamples,
}

/// Client read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadRequest {
    /// `None` means a single sample with no rate or time bound.
    pub delivery_control: Option<DeliveryControl>,
    pub data_format: DataFormat,
}

impl ReadRequest {
    pub fn new(delivery_control: DeliveryControl) -> Self {
        Self {
            delivery_control: Some(delivery_control),
            data_format: DataFormat::Data,
        }
    }
}

/// Samples pending in the middleware for one reader.
struct MiddlewareSource {
    reader_id: u16,
    middleware: Arc<dyn Middleware>,
}

impl SampleSource for MiddlewareSource {
    fn next_sample_size(&mut self) -> Option<usize> {
        if self.middleware.unread_count(self.reader_id) == 0 {
            return None;
        }
        self.middleware.next_sample_size(self.reader_id)
    }

    fn take_sample(&mut self) -> Option<Vec<u8>> {
        self.middleware.take_next_sample(self.reader_id)
    }
}

/// Reader entity: drives a [`RateControlledReader`] over the middleware's
/// sample queue for this reader.
pub struct DataReader {
    handle: MiddlewareHandle,
    engine: RateControlledReader,
}

impl DataReader {
    pub(super) fn new(handle: MiddlewareHandle, gate: Arc<dyn DeliveryGate>) -> Self {
        let engine = RateControlledReader::with_gate(handle.id, gate);
        let waker = engine.waker();
        let listener: DataListener = Arc::new(move || waker.wake());
        handle
            .middleware()
            .set_data_listener(handle.id.raw(), Some(listener));
        Self { handle, engine }
    }

    pub(super) fn handle(&self) -> &MiddlewareHandle {
        &self.handle
    }

    pub fn id(&self) -> ObjectId {
        self.handle.id
    }

    /// Start a read session, replacing any session in flight.
    ///
    /// Every delivered sample is passed to `sink` together with this
    /// reader's id.
    pub fn read<F>(&self, request: &ReadRequest, mut sink: F) -> Result<(), XrceError>
    where
        F: FnMut(ObjectId, Vec<u8>) + Send + 'static,
    {
        self.engine.stop();

        let control = request.delivery_control.unwrap_or_default();
        log::debug!(
            "[XRCE] reader {} read request ({:?}, max_samples={})",
            self.handle.id,
            request.data_format,
            control.max_samples
        );

        let source = MiddlewareSource {
            reader_id: self.handle.id.raw(),
            middleware: self.handle.middleware().clone(),
        };
        let id = self.handle.id;
        self.engine
            .start(control, source, move |sample| sink(id, sample))
    }

    pub fn stop_read(&self) {
        self.engine.stop();
    }

    pub fn is_reading(&self) -> bool {
        self.engine.is_running()
    }

    /// Synchronously take one sample, waiting up to `timeout`.
    pub fn read_once(&self, timeout: Duration) -> Result<Option<Vec<u8>>, XrceError> {
        self.handle
            .middleware()
            .read_data(self.handle.id.raw(), timeout)
    }
}

impl Drop for DataReader {
    fn drop(&mut self) {
        // Session first, then listener; the handle deletes the middleware reader.
        self.engine.stop();
        self.handle
            .middleware()
            .set_data_listener(self.handle.id.raw(), None);
    }
}
