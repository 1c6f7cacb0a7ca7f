pub mod dependencies;
pub mod healing;
pub mod system;

pub use dependencies::*;
pub use healing::*;
pub use system::*;
