pub mod volume;

pub use volume::{collect_batch, collect_symbol, field_extractors, Target};
