pub mod takeout;

pub use takeout::{parse_takeout, parse_watch_url, IngestStats, ParsedHistory};
