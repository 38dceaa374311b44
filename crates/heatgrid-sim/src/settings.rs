//! Launcher settings: positional grid shape plus environment overrides
//!
//! ```text
//! heatgrid [<rows> <cols>]
//!
//! HEATGRID_WORKERS        worker count (default rows*cols, or 9)
//! HEATGRID_NODE_INTERVAL  node tick, e.g. "500ms" or "0.5"
//! HEATGRID_BASE_INTERVAL  correlator pause per report
//! HEATGRID_ITERATIONS     reports accepted before draining
//! HEATGRID_SEED           "wallclock" or an integer
//! HEATGRID_CONSISTENCY    "relaxed" or "strict"
//! HEATGRID_LOG_PATH       run log file (default base_log.txt)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use heatgrid_core::{GridShape, HeatgridError, HeatgridResult, RunConfig, SeedPolicy};

pub const DEFAULT_LOG_PATH: &str = "base_log.txt";
const DEFAULT_WORKERS: usize = 9;

#[derive(Clone, Debug)]
pub struct Settings {
    pub config: RunConfig,
    /// Ranks in the world: workers plus the correlator
    pub process_count: usize,
    pub log_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> HeatgridResult<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::resolve(&args, |key| std::env::var(key).ok())
    }

    pub fn resolve<F>(args: &[String], env: F) -> HeatgridResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workers = env("HEATGRID_WORKERS")
            .map(|v| parse_count("HEATGRID_WORKERS", &v))
            .transpose()?;

        let grid = match args {
            [] => GridShape::balanced(workers.unwrap_or(DEFAULT_WORKERS))?,
            [rows, cols] => GridShape::new(parse_count("rows", rows)?, parse_count("cols", cols)?)?,
            _ => {
                return Err(HeatgridError::InvalidConfig(
                    "usage: heatgrid [<rows> <cols>]".into(),
                ))
            }
        };

        let mut config = RunConfig::new(grid);
        if let Some(v) = env("HEATGRID_NODE_INTERVAL") {
            config.params.node_interval = parse_interval("HEATGRID_NODE_INTERVAL", &v)?;
        }
        if let Some(v) = env("HEATGRID_BASE_INTERVAL") {
            config.params.base_interval = parse_interval("HEATGRID_BASE_INTERVAL", &v)?;
        }
        if let Some(v) = env("HEATGRID_ITERATIONS") {
            config.params.iteration_budget = v.trim().parse().map_err(|_| invalid("HEATGRID_ITERATIONS", &v))?;
        }
        if let Some(v) = env("HEATGRID_SEED") {
            config.seed = parse_seed(&v)?;
        }
        if let Some(v) = env("HEATGRID_CONSISTENCY") {
            config.consistency = v.parse()?;
        }

        Ok(Settings {
            process_count: workers.unwrap_or(grid.cells()) + 1,
            config,
            log_path: env("HEATGRID_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH)),
        })
    }
}

fn invalid(name: &str, value: &str) -> HeatgridError {
    HeatgridError::InvalidConfig(format!("{}: cannot parse '{}'", name, value))
}

fn parse_count(name: &str, value: &str) -> HeatgridResult<usize> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

/// Human-readable duration ("250ms", "2s") or plain seconds ("0.5")
fn parse_interval(name: &str, value: &str) -> HeatgridResult<Duration> {
    let value = value.trim();
    if let Ok(d) = humantime::parse_duration(value) {
        return Ok(d);
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(name, value))
}

fn parse_seed(value: &str) -> HeatgridResult<SeedPolicy> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("wallclock") {
        return Ok(SeedPolicy::WallClock);
    }
    value
        .parse()
        .map(SeedPolicy::Fixed)
        .map_err(|_| invalid("HEATGRID_SEED", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use heatgrid_core::Consistency;

    fn resolve(args: &[&str], vars: &[(&str, &str)]) -> HeatgridResult<Settings> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::resolve(&args, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = resolve(&[], &[]).unwrap();
        assert_eq!(s.config.grid, GridShape { rows: 3, cols: 3 });
        assert_eq!(s.process_count, 10);
        assert_eq!(s.config.params.node_interval, Duration::from_millis(500));
        assert_eq!(s.config.params.iteration_budget, 20);
        assert_eq!(s.log_path, PathBuf::from("base_log.txt"));
        assert!(s.config.validate(s.process_count).is_ok());
    }

    #[test]
    fn test_explicit_grid() {
        let s = resolve(&["2", "4"], &[]).unwrap();
        assert_eq!(s.config.grid, GridShape { rows: 2, cols: 4 });
        assert_eq!(s.process_count, 9);
    }

    #[test]
    fn test_worker_mismatch_fails_validation() {
        let s = resolve(&["3", "3"], &[("HEATGRID_WORKERS", "8")]).unwrap();
        let err = s.config.validate(s.process_count).unwrap_err();
        assert!(matches!(err, HeatgridError::GridMismatch { workers: 8, .. }));
    }

    #[test]
    fn test_overrides() {
        let s = resolve(
            &[],
            &[
                ("HEATGRID_NODE_INTERVAL", "250ms"),
                ("HEATGRID_BASE_INTERVAL", "0.1"),
                ("HEATGRID_ITERATIONS", "7"),
                ("HEATGRID_SEED", "42"),
                ("HEATGRID_CONSISTENCY", "Strict"),
                ("HEATGRID_LOG_PATH", "/tmp/run.txt"),
            ],
        )
        .unwrap();
        assert_eq!(s.config.params.node_interval, Duration::from_millis(250));
        assert_eq!(s.config.params.base_interval, Duration::from_millis(100));
        assert_eq!(s.config.params.iteration_budget, 7);
        assert_eq!(s.config.seed, SeedPolicy::Fixed(42));
        assert_eq!(s.config.consistency, Consistency::Strict);
        assert_eq!(s.log_path, PathBuf::from("/tmp/run.txt"));
    }

    #[test]
    fn test_bad_input_is_config_error() {
        for err in [
            resolve(&["3"], &[]).unwrap_err(),
            resolve(&["x", "3"], &[]).unwrap_err(),
            resolve(&[], &[("HEATGRID_ITERATIONS", "-1")]).unwrap_err(),
            resolve(&[], &[("HEATGRID_NODE_INTERVAL", "soon")]).unwrap_err(),
            resolve(&[], &[("HEATGRID_CONSISTENCY", "eventual")]).unwrap_err(),
        ] {
            assert!(err.is_config_error(), "{}", err);
        }
    }
}
