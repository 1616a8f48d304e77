#![cfg_attr(docsrs, feature(doc_cfg))]
//! # nevameter_lib
//!
//! This crate provides a library for reading electricity meters that speak the
//! IEC 61107 (IEC 62056-21) readout protocol over a serial line, such as the
//! NEVA MT series.
//!
//! The [`protocol`] module is a pure codec: it builds request frames, verifies
//! and decodes responses and never touches a port. The client modules wrap it
//! in a readout session on top of a serial port.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `nevameter` command-line tool and pulls in `serialport` and `protocol_serde`.
//!
//! ### Client Features
//! - `serialport`: Enables the **synchronous** client using the `serialport` crate.
//! - `tokio-serial-async`: Enables the **asynchronous** client using `tokio` and `tokio-serial`.
//!
//! ### Utility Features
//! - `protocol_serde`: Enables `serde` support for the decoded messages and values.
//! - `bin-dependencies`: Enables all features required by the `nevameter` binary executable.

/// Contains error types for the library.
mod error;
/// Defines the frame codec of the readout protocol.
pub mod protocol;

pub use error::Error;

/// Synchronous client for meter communication.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;

/// Asynchronous client for meter communication.
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-serial-async")))]
#[cfg(feature = "tokio-serial-async")]
pub mod tokio_serial_async;
