//! APNs Credentials
//!
//! Loading of the client certificate and private key that authenticate the
//! connection to the gateway.

mod identity;

pub use identity::*;
