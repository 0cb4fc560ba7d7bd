//! Process exit codes.
//!
//! Pipeline failures exit with `RunError::exit_code()`:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Run finished (registration failures included) |
//! | 1 | Unexpected failure outside the pipeline |
//! | 2 | Configuration: config file, platform id, secret |
//! | 3 | Host does not match the platform |
//! | 4 | WPT checkout: git, manifest, patch |
//! | 5 | Test runner or report |
//! | 6 | Writing artifacts |
//! | 7 | Upload |

pub const SUCCESS: i32 = 0;
pub const INTERNAL_ERROR: i32 = 1;
