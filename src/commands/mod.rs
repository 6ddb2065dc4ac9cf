// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations

pub mod ingest;
pub mod quiz;
pub mod search;
pub mod status;

use anyhow::{anyhow, Result};
use aria::config::{Config, CourseConfig};

/// Look up a configured course or fail with the known names.
pub(crate) fn course(config: &Config, name: &str) -> Result<CourseConfig> {
    config.course(name).ok_or_else(|| {
        let known = config.course_names();
        if known.is_empty() {
            anyhow!("unknown course '{}': no courses are configured", name)
        } else {
            anyhow!("unknown course '{}' (configured: {})", name, known.join(", "))
        }
    })
}
