pub mod folder;
pub mod image;
pub mod like;

pub use folder::{FolderRecord, FolderScope};
pub use image::ImageRecord;
pub use like::LikeEntry;
