//!  Storage is organized through [session_storage::JsonSessionStorage].
//!  The basic idea is:
//!   - There is one output directory holding every file.
//!   - Each session is a JSON document named after the minute it started, rewritten after
//!     every keystroke.
//!   - In daily mode closed sessions are also collected into one log file per calendar date.

pub mod entities;
pub mod session_storage;
