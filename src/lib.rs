pub mod cc;
pub mod error;
pub mod proto;
pub mod server;
pub mod session;
pub mod sim;

pub use error::{Error, Result};

#[cfg(test)]
mod test;
