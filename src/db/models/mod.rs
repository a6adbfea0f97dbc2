pub mod response;
pub mod upload;

pub use response::{AttentionRecord, ResponseRecord, SummaryEntry};
pub use upload::Upload;
