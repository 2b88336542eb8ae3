// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release backends - install, upgrade and uninstall of chart releases.

pub mod helm;
pub mod mock;
mod traits;

pub use helm::{HelmBackend, HelmConfig};
pub use mock::{MockReleaseBackend, ReleaseCall};
pub use traits::*;
