//! Infrastructure layer for the host driver.
//!
//! - **`device_conn`** – The host end of a link: frames commands onto the
//!   stream and reassembles the device's event frames.

pub mod device_conn;
