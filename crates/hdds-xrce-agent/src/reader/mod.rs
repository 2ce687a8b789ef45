// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rate-controlled read delivery.

mod rate_controlled;
mod token_bucket;

pub use rate_controlled::{
    AllowAll, DeliveryControl, DeliveryGate, RateControlledReader, ReaderWaker, SampleSource,
};
pub use token_bucket::TokenBucket;
