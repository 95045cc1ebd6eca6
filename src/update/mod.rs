pub mod composer;

pub use composer::{UpdateDocument, UpdateEntry, compose};
