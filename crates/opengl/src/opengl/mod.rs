mod device;
mod headless;
mod info;
mod util;

pub use device::*;
pub use headless::*;
pub use info::*;
pub use util::*;
