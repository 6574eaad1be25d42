// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchyard integration tests.
//!
//! Provides scriptable plugins and a recording transport so registry and
//! dispatch behavior can be exercised without real modules or extensions.
//!
//! # Components
//!
//! - [`MockPlugin`] - Plugin with queued responses, scripted failures, and call capture
//! - [`RecordingCaller`] - External caller that records every forwarded call

pub mod mock_external;
pub mod mock_plugin;

pub use mock_external::{ForwardedCall, RecordingCaller};
pub use mock_plugin::MockPlugin;
