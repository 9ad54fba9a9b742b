pub mod record;

pub use record::{sort_newest_first, RecognizedTextRecord};
