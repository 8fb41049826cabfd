//! Utility Functions and Diagnostics
//!
//! Startup diagnostics and user-friendly error formatting.
//!
//! ## Diagnostics
//!
//! The [`diagnostics`] module logs the runtime environment at startup:
//!
//! ```no_run
//! use bt_page_turner::config::Config;
//! use bt_page_turner::utils::{check_path, log_startup_diagnostics, PathStatus};
//!
//! let config = Config::default();
//! log_startup_diagnostics(&config);
//!
//! if check_path(&config.paths.device_dir) != PathStatus::Readable {
//!     eprintln!("cannot read input devices");
//! }
//! ```
//!
//! ## Error Formatting
//!
//! The [`errors`] module turns fatal startup errors into messages with
//! troubleshooting steps:
//! - Input directory errors → missing directory, `input` group membership
//! - inotify errors → instance/watch limits
//! - Config errors → TOML syntax, valid value ranges

pub mod diagnostics;
pub mod errors;

pub use diagnostics::{check_path, count_rule_files, log_startup_diagnostics, HostInfo, PathStatus};
pub use errors::format_user_error;
