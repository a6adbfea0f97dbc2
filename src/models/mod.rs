pub mod event;
pub mod response;
pub mod session;

pub use event::{VideoId, WatchEvent};
pub use response::{AttentionSide, Response};
pub use session::{EventRef, SessionId, ViewSession};
