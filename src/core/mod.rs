//! Core remote-terminal components.
//!
//! - **session**: SSH transport + authenticated remote session
//! - **term**: virtual screen state and ANSI escape sequence parser
//!
//! # Architecture
//!
//! ```text
//! ProtocolAdapter
//! ├── RemoteSession (byte I/O with the remote host)
//! └── Screen
//!     ├── Grid (cell rows + scrollback)
//!     ├── Cursor
//!     └── VtParser (ANSI escape sequences)
//! ```

pub mod session;
pub mod term;
