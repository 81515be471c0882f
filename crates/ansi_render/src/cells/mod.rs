pub mod atlas;
pub mod compose;
pub mod grid;
pub mod matcher;
pub mod palette;
