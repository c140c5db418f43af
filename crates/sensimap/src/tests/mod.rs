//! End-to-end tests for the command-line front end
//!
//! Tests are organized by topic:
//! - `line_profile_run` - Full sensitivity runs over the line-profile domain

mod line_profile_run;
