pub mod analysis;
pub mod enums;
pub mod lab;
pub mod profile;

pub use analysis::*;
pub use enums::*;
pub use lab::*;
pub use profile::*;
