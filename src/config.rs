// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::time::Duration;

/// Scheduling priority hint for the manager's background poll-loop task.
/// Best-effort: a platform that cannot honor the hint logs a warning and
/// otherwise ignores it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitorPriority {
    Low,
    Normal,
    High,
}

impl Default for MonitorPriority {
    fn default() -> Self {
        MonitorPriority::Normal
    }
}

/// Runtime-configurable knobs for the background poll loop.
#[derive(Clone, Copy, Debug)]
pub struct MonitorConfig {
    /// Sleep between poll ticks.
    pub interval: Duration,
    /// Scheduling priority hint for the background loop task.
    pub priority: MonitorPriority,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            priority: MonitorPriority::Normal,
        }
    }
}
