use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use edgeprop_core::config::load_config;
use edgeprop_core::timing::{StageTimer, StageTiming};
use edgeprop_core::{Instance, PropagationConfig};
use edgeprop_diffuse::{
    ProjectionSink, ResultSink, RunInputs, RunSummary, StateAttributeSink, propagate, publish,
};
use serde::Serialize;
use tracing::info;

use crate::output::{OutputMode, pretty_kv, render};

/// Arguments for `ep run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory holding the instance files.
    #[arg(long)]
    pub instance_dir: PathBuf,

    /// Instance name; files are `<name>.<ext>`.
    #[arg(long)]
    pub name: String,

    /// TOML configuration file. Defaults to the per-user config, if any.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of discrete states `K`.
    #[arg(long)]
    pub states: Option<usize>,

    /// Number of diffusion rounds.
    #[arg(long, allow_negative_numbers = true)]
    pub iterations: Option<i64>,

    /// Probability of a background seed.
    #[arg(long)]
    pub percent_zero: Option<f64>,

    /// Probability of a labeled seed when the background draw fails.
    #[arg(long)]
    pub percent_nonzero: Option<f64>,

    /// Background seeds carry `1 - alpha` at state 0.
    #[arg(long)]
    pub alpha: Option<f64>,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Count an edge's own vector once instead of once per endpoint.
    #[arg(long)]
    pub no_self_twice: bool,

    /// Run each round on a thread pool.
    #[arg(long)]
    pub parallel: bool,

    /// Also write labeled edges as JSON lines to this file.
    #[arg(long)]
    pub projection: Option<PathBuf>,

    /// Do not write the `<name>.state` side file.
    #[arg(long)]
    pub no_state_file: bool,
}

impl RunArgs {
    /// Flags override whatever the config file set.
    fn apply(&self, config: &mut PropagationConfig) {
        if let Some(states) = self.states {
            config.states = states;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(p) = self.percent_zero {
            config.percent_zero = p;
        }
        if let Some(p) = self.percent_nonzero {
            config.percent_nonzero = p;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if self.no_self_twice {
            config.include_self_twice = false;
        }
        if self.parallel {
            config.parallel = true;
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    instance: String,
    #[serde(flatten)]
    summary: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<PathBuf>,
}

/// Load an instance, propagate labels and publish them.
///
/// # Errors
///
/// Returns an error when loading, configuration, the run itself or any
/// sink fails.
pub fn run_run(args: &RunArgs, output: OutputMode, timer: &mut StageTimer) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().map_err(edgeprop_core::Error::from)?;

    let instance = Instance::new(&args.instance_dir, &args.name);
    let (graph, attributes, known) = timer.time("load", || -> Result<_> {
        let graph = instance
            .load_topology()
            .with_context(|| format!("failed to load instance {}", args.name))?;
        let attributes = instance.load_attributes(&graph)?;
        let known = instance.load_seeds(&graph)?;
        Ok((graph, attributes, known))
    })?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        known = known.len(),
        "instance loaded"
    );

    let inputs = RunInputs {
        known,
        cancel: None,
    };
    let run = propagate(&graph, &config, inputs, timer)?;

    let mut state_sink = (!args.no_state_file).then(|| StateAttributeSink::new(instance.clone()));
    let mut projection_sink = args
        .projection
        .as_deref()
        .map(open_projection)
        .transpose()?;

    {
        let mut sinks: Vec<&mut dyn ResultSink> = Vec::new();
        if let Some(sink) = state_sink.as_mut() {
            sinks.push(sink);
        }
        if let Some(sink) = projection_sink.as_mut() {
            sinks.push(sink);
        }
        publish(&graph, &attributes, &run.labels, &mut sinks, timer)?;
    }

    let mut summary = run.summary;
    summary.timings = timer.stages().to_vec();
    let report = RunReport {
        instance: args.name.clone(),
        summary,
        state_file: state_sink.as_ref().and_then(|s| s.written().map(Path::to_path_buf)),
        projection: args.projection.clone(),
    };

    render(output, &report, |r, w| {
        let s = &r.summary;
        pretty_kv(w, "instance", &r.instance)?;
        pretty_kv(w, "edges", s.edges.to_string())?;
        pretty_kv(w, "rounds", s.rounds.to_string())?;
        pretty_kv(
            w,
            "seeds",
            format!(
                "{} background / {} labeled / {} known / {} unlabelled",
                s.seeds.background, s.seeds.labeled, s.seeds.known, s.seeds.unlabelled
            ),
        )?;
        for (state, count) in s.state_counts.iter().enumerate() {
            writeln!(w, "  state {state:>3}: {count}")?;
        }
        if let Some(path) = &r.state_file {
            pretty_kv(w, "state file", path.display().to_string())?;
        }
        if let Some(path) = &r.projection {
            pretty_kv(w, "projection", path.display().to_string())?;
        }
        Ok(())
    })
}

fn open_projection(path: &Path) -> Result<ProjectionSink<BufWriter<File>>> {
    let file = File::create(path)
        .map_err(|e| edgeprop_core::Error::write(path, e))
        .context("failed to open projection output")?;
    Ok(ProjectionSink::new(BufWriter::new(file)))
}

/// Print recorded stage timings to stderr.
///
/// # Errors
///
/// Returns an error if the JSON rendering fails.
pub fn report_timings(stages: &[StageTiming]) -> Result<()> {
    if stages.is_empty() {
        eprintln!("timing report: no samples recorded");
        return Ok(());
    }
    eprintln!("timing report:");
    for stage in stages {
        eprintln!(
            "  {:<10} {:>10.3} ms",
            stage.stage,
            stage.elapsed.as_secs_f64() * 1000.0
        );
    }
    eprintln!("timing report (json):");
    eprintln!("{}", serde_json::to_string_pretty(stages)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_fields() {
        let args = RunArgs {
            states: Some(3),
            iterations: Some(7),
            seed: Some(99),
            no_self_twice: true,
            ..RunArgs::default()
        };
        let mut config = PropagationConfig {
            alpha: 0.5,
            ..PropagationConfig::default()
        };
        args.apply(&mut config);
        assert_eq!(config.states, 3);
        assert_eq!(config.iterations, 7);
        assert_eq!(config.random_seed, 99);
        assert!(!config.include_self_twice);
        assert!((config.alpha - 0.5).abs() < f64::EPSILON);
        assert!(!config.parallel);
    }
}
