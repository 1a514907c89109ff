use std::time::{Duration, Instant};

use serde::Serialize;

/// Duration of one named pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Records stage durations for a single run.
///
/// A disabled timer still runs every stage but records nothing.
#[derive(Debug, Clone, Default)]
pub struct StageTimer {
    enabled: bool,
    stages: Vec<StageTiming>,
}

/// Returns true when `EDGEPROP_TIMING` is set to a truthy value
/// (`1`, `true`, `yes`, `on`; case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("EDGEPROP_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl StageTimer {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, recording its duration under `stage` when enabled.
    pub fn time<R>(&mut self, stage: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }
        let started = Instant::now();
        let result = f();
        self.stages.push(StageTiming {
            stage: stage.to_string(),
            elapsed: started.elapsed(),
        });
        result
    }

    #[must_use]
    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    /// Take the recorded stages, leaving the timer empty.
    pub fn take(&mut self) -> Vec<StageTiming> {
        std::mem::take(&mut self.stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_timer_records_nothing() {
        let mut timer = StageTimer::new(false);
        let value = timer.time("seed", || 42);
        assert_eq!(value, 42);
        assert!(timer.stages().is_empty());
    }

    #[test]
    fn enabled_timer_records_in_order() {
        let mut timer = StageTimer::new(true);
        timer.time("load", || ());
        timer.time("diffuse", || ());
        let names: Vec<&str> = timer.stages().iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, vec!["load", "diffuse"]);
        assert_eq!(timer.take().len(), 2);
        assert!(timer.stages().is_empty());
    }

    #[test]
    fn elapsed_serializes_as_milliseconds() {
        let timing = StageTiming {
            stage: "diffuse".to_string(),
            elapsed: Duration::from_micros(1500),
        };
        let json = serde_json::to_value(&timing).expect("serializes");
        assert_eq!(json["stage"], "diffuse");
        assert!((json["elapsed"].as_f64().expect("number") - 1.5).abs() < 1e-9);
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["0", "false", "", "maybe"] {
            assert!(!is_truthy(v), "{v} should be falsy");
        }
    }
}
