pub mod models;
pub mod source;
pub mod video_id;

pub use models::{EmbedMode, VideoId};
pub use source::SourceBuilder;
pub use video_id::VideoIdExtractor;
