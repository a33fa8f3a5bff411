//! HTTP request handlers

pub mod collection;
pub mod health;
pub mod readings;
pub mod reports;

pub use collection::*;
pub use health::*;
pub use readings::*;
pub use reports::*;
