// camrelay-core - Configuration, logging, errors and the login gate for
// CamRelay. The transport and media layers live in camrelay-stream.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{Error, Result};
