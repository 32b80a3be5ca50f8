pub mod amount;
pub mod client;
pub mod executor;
pub mod gas;
pub mod registry;

pub use amount::*;
pub use client::*;
pub use executor::*;
pub use gas::*;
pub use registry::*;
