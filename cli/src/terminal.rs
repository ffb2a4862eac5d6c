//! Everything that ends up on the user's screen.

pub mod colors;
pub mod format;
pub mod logging;
pub mod print;
pub mod spinner;
