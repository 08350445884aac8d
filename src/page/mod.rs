pub mod memory;
pub mod models;
pub mod traits;

pub use memory::MemoryPage;
pub use models::{ElementId, Markup, Query};
pub use traits::Page;
