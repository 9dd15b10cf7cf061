//! Process exit codes
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Storage error - the backend could not be initialized or served
pub const STORAGE_ERROR: i32 = 3;

/// IO error - socket bind failure, unreadable config file, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - missing or invalid options (sysexits.h EX_USAGE)
pub const USAGE_ERROR: i32 = 64;

/// Configuration error - invalid backend settings (sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;
