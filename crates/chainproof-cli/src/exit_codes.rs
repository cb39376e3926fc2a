//! Exit codes are part of the public contract; scripts branch on them.

pub const SUCCESS: i32 = 0;
pub const TEST_FAILED: i32 = 1; // failing tests, or an invalid test source
pub const CONFIG_ERROR: i32 = 2;
pub const INFRA_ERROR: i32 = 3; // workspace, process, timeout or coverage report
pub const INTERRUPTED: i32 = 130; // Ctrl-C; runner killed and workspace cleaned
