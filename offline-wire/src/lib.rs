//! Wire types and error kinds shared between the offline payment core and
//! the server-side reconciliation contract it talks to.
//!
//! Kept dependency-light (serde + serde_json + thiserror only) since this
//! crate is meant to be vendorable by a server implementation that has no
//! business depending on `ring`, `keyring`, or `reqwest`.

pub mod error;
pub mod hex;
pub mod money;
pub mod qr;
pub mod sync;
pub mod time;
pub mod transaction;

pub use error::{ErrorKind, ErrorResponse};
pub use money::MinorUnits;
pub use time::TimestampMillis;
