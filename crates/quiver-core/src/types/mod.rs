//! Core types for Quiver

mod bucket;
mod listing;
mod multipart;
mod notification;
mod object;
mod post_policy;
mod presigned;

pub use bucket::*;
pub use listing::*;
pub use multipart::*;
pub use notification::*;
pub use object::*;
pub use post_policy::*;
pub use presigned::*;
