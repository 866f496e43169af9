// Loading
mod loader;
pub use loader::Image;

// Running
mod runtime;
pub use runtime::{RunFlag, RunState, Status};
mod memory;
pub use memory::{Memory, KBDR, KBSR, MEMORY_MAX};
mod trap;
pub use trap::TrapVect;
mod console;
pub use console::{BufferedConsole, Console, TermConsole};

mod error;
pub use error::{ImageError, RunError};

pub mod env;
pub mod output;
