//! # System Interaction Layer
//!
//! Everything that touches the operating system lives here: the terminal
//! mode, the keyboard, child processes and signals. The session in
//! `core::session` drives these pieces but never reaches past them.
//!
//! ## Modules
//!
//! - **`terminal`**: Switches the controlling terminal between raw and cooked
//!   mode, and guarantees it is restored when the session ends.
//! - **`keys`**: A reader thread that turns keystrokes into bytes on a
//!   channel. It can be paused so a running program gets the keyboard.
//! - **`supervisor`**: Spawns the compiler and the compiled program, collects
//!   compiler output, and keeps at most one child alive at a time.
//! - **`interrupt`**: Forwards SIGINT/SIGTERM to the session as messages.

pub mod interrupt;
pub mod keys;
pub mod supervisor;
pub mod terminal;
