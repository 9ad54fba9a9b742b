pub mod store;

pub use store::{RecognizedTextStore, DEFAULT_STORAGE_KEY};
