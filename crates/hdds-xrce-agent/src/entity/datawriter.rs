// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::MiddlewareHandle;
use crate::error::XrceError;
use crate::object::ObjectId;

/// Writer entity: forwards client samples straight to the middleware.
pub struct DataWriter {
    handle: MiddlewareHandle,
}

impl DataWriter {
    pub(super) fn new(handle: MiddlewareHandle) -> Self {
        Self { handle }
    }

    pub(super) fn handle(&self) -> &MiddlewareHandle {
        &self.handle
    }

    pub fn id(&self) -> ObjectId {
        self.handle.id
    }

    /// Write one serialized sample.
    pub fn write(&self, data: &[u8]) -> Result<(), XrceError> {
        self.handle
            .middleware()
            .write_data(self.handle.id.raw(), data)?;
        log::debug!(
            "[XRCE] writer {} forwarded {} bytes",
            self.handle.id,
            data.len()
        );
        Ok(())
    }
}
