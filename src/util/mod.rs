//! Basic utilities: errors, the byte cursor, and code page conversion.

pub mod cp1251;
pub mod cursor;
pub mod error;

pub use cursor::{Reader, Writer};
pub use error::{Error, Result};
