pub mod config;
pub mod dedup;
pub mod error;
pub mod error_recovery;
pub mod error_utils;
pub mod filter;
pub mod traits;
pub mod types;

pub use config::*;
pub use dedup::*;
pub use error::*;
pub use error_recovery::*;
pub use error_utils::*;
pub use traits::*;
pub use types::*;
