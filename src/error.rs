// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `echonet_switch` library.
//!
//! Switch commands never surface write failures as errors: a rejected write
//! simply leaves the switch where it was. The types here cover the places
//! where failing loudly is the right call: transport plumbing, loading
//! capability tables and configuration, and addressing unknown switches.

use thiserror::Error;

use crate::types::PropertyCode;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while parsing a capability table or configuration.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// No switch is registered under the given unique ID.
    #[error("switch not found: {0}")]
    SwitchNotFound(String),

    /// A device with the same UID is already registered.
    #[error("device already registered: {0}")]
    DeviceAlreadyRegistered(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// An invalid power state string was provided.
    #[error("invalid power state: {0}")]
    InvalidPowerState(String),

    /// A code byte could not be parsed.
    #[error("invalid code: {0}")]
    InvalidCode(String),
}

/// Errors reported by a device transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The device did not confirm a property write.
    #[error("write of {value:#04x} to {code} was rejected")]
    Rejected {
        /// The property that was written.
        code: PropertyCode,
        /// The value that was sent.
        value: u8,
    },

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Connection to the device failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors related to parsing capability tables and configuration.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
