pub mod adapter;
pub mod cursor;
pub mod images;
pub mod loader;
pub mod object;
pub mod picker;
pub mod selection;
pub mod source;
pub mod types;

#[cfg(test)]
pub mod tests;

pub use adapter::{GraphObjectAdapter, Row, SectionAndItem, ViewType};
pub use cursor::GraphObjectCursor;
pub use images::{HttpImageFetcher, ImageDownloader, ImageFetcher, PictureCache};
pub use loader::PagingLoader;
pub use object::GraphObject;
pub use picker::{Picker, PickerEvent};
pub use selection::SelectionStrategy;
pub use source::{FileGraphSource, GraphSource, HttpGraphSource};
pub use types::*;
