pub mod clock;
pub mod console;
pub mod dir;
pub mod logging;
pub mod time;
