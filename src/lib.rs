// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

pub mod codec;
mod device;
mod dispatch;
mod error;
mod frame;
mod tracker;
pub mod util;

pub use device::*;
pub use dispatch::*;
pub use error::*;
pub use frame::*;
pub use tracker::*;
