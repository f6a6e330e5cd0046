pub mod error;

pub use error::{DelegateError, Result};
