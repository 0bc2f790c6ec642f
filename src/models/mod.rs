pub mod audit;
pub mod decision;
pub mod enums;
pub mod payload;

pub use audit::*;
pub use decision::*;
pub use enums::*;
pub use payload::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnum { field: String, value: String },
}
