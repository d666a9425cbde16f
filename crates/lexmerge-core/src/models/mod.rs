pub mod merge;
pub mod review;
pub mod sense;
pub mod word;

pub use merge::*;
pub use review::*;
pub use sense::*;
pub use word::*;
