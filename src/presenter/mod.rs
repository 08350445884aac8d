pub mod fallback;
pub mod lazy;

pub use fallback::FallbackPresenter;
pub use lazy::{LazyPreview, LazyReveal};
