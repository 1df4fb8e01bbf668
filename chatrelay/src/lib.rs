// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod message;
pub mod relay;
pub mod stream;
pub mod upstream;
