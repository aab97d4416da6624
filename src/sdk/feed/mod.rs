pub mod error;
pub mod models;
pub mod parser;

pub use error::FeedError;
pub use models::{Feed, Route, Stop, Trip};
pub use parser::FeedReader;
