// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol value types.

mod code;
mod power;

pub use code::{ClassCode, GroupCode, ObjectKey, PropertyCode};
pub use power::{PowerState, ValueMap};
