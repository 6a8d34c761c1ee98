//! HTML rendering for the three dashboard pages.

pub mod explore;
pub mod landing;
pub mod layout;
pub mod prediction;
