pub mod db;
pub mod models;
mod records;
mod tables;

pub use db::{Database, DatabaseError};
pub use models::{Attachment, Entity};
pub use tables::*;
