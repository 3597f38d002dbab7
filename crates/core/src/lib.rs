// crates/core/src/lib.rs
pub mod error;
pub mod media;
pub mod progress_line;
pub mod types;
pub mod video_id;

pub use error::*;
pub use media::*;
pub use progress_line::*;
pub use types::*;
pub use video_id::*;
