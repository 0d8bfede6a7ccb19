use super::CliError;
use super::helpers::{compute_error, parse_params, print_json};
use super::registry::{IntegrationMethod, density_names, density_spec};
use dfe_core::cache::load_library;
use dfe_core::config::{CacheConfig, load_cache_config};
use dfe_core::integrate::{IntegrationOptions, IntegrationOutcome, Integrator};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(super) enum Preset {
    /// 500 deleterious gammas over (1e-4, 2000)
    Default,
    /// 901 deleterious and 701 beneficial gammas
    Reference,
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["config", "preset"])))]
pub(super) struct GammasArgs {
    /// Cache configuration JSON path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in cache configuration
    #[arg(long, value_enum)]
    preset: Option<Preset>,
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Persisted spectrum cache
    #[arg(value_name = "cache")]
    cache: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct IntegrateArgs {
    /// Persisted spectrum cache
    #[arg(value_name = "cache")]
    cache: PathBuf,

    /// Density family (gamma, lognormal, neugamma, gammalet, neugammalet, shifted_gamma)
    #[arg(long)]
    density: String,

    /// Comma-separated density parameters, point-mass (proportion, gamma) pairs last
    #[arg(long, allow_hyphen_values = true, default_value = "")]
    params: String,

    /// Population-scaled mutation rate
    #[arg(long, allow_negative_numbers = true)]
    theta: f64,

    /// Integration method; defaults to the density's registered method
    #[arg(long, value_enum)]
    method: Option<IntegrationMethod>,

    /// Number of trailing point-mass pairs in --params
    #[arg(long, default_value_t = 0)]
    point_masses: usize,

    /// Skip the density mass outside the cached gamma range
    #[arg(long)]
    no_exterior: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GammasReport<'a> {
    negative_len: usize,
    positive_count: usize,
    values: &'a [f64],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntegrateReport<'a> {
    density: &'static str,
    method: &'static str,
    params: &'a [f64],
    theta: f64,
    total: f64,
    #[serde(flatten)]
    outcome: IntegrationOutcome,
}

pub(super) fn run_gammas_command(args: GammasArgs) -> Result<i32, CliError> {
    let config = match (args.config, args.preset) {
        (Some(path), _) => load_cache_config(&path).map_err(compute_error)?,
        (None, Some(Preset::Reference)) => CacheConfig::reference_workflow(),
        (None, Some(Preset::Default) | None) => CacheConfig::default(),
    };
    let grid = config.gamma_grid().map_err(compute_error)?;

    print_json(&GammasReport {
        negative_len: grid.negative_len(),
        positive_count: grid.positive_count(),
        values: grid.values(),
    })?;
    Ok(0)
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let library = load_library(&args.cache).map_err(compute_error)?;
    print_json(&library.summary())?;
    Ok(0)
}

pub(super) fn run_integrate_command(args: IntegrateArgs) -> Result<i32, CliError> {
    let spec = density_spec(&args.density).ok_or_else(|| {
        CliError::Usage(format!(
            "unknown density '{}'; expected one of: {}",
            args.density,
            density_names().join(", ")
        ))
    })?;
    let params = parse_params(&args.params)?;
    let method = args.method.unwrap_or(if args.point_masses > 0 {
        IntegrationMethod::PointMasses
    } else {
        spec.default_method
    });

    if args.point_masses > 0 && method != IntegrationMethod::PointMasses {
        return Err(CliError::Usage(format!(
            "--point-masses requires --method point-masses, got {}",
            method.as_str()
        )));
    }
    let expected = spec.param_count() + 2 * args.point_masses;
    if params.len() != expected {
        return Err(CliError::Usage(format!(
            "density '{}' with {} point mass(es) expects {} parameters ({}{}), got {}",
            spec.name,
            args.point_masses,
            expected,
            spec.family.param_names().join(", "),
            if args.point_masses > 0 {
                ", then proportion/gamma pairs"
            } else {
                ""
            },
            params.len()
        )));
    }

    let mut library = load_library(&args.cache).map_err(compute_error)?;
    let integrator = Integrator::new(IntegrationOptions {
        include_exterior_mass: !args.no_exterior,
        ..IntegrationOptions::default()
    });
    info!(
        density = spec.name,
        method = method.as_str(),
        gammas = library.len(),
        "integrating cached spectra"
    );

    let outcome = match method {
        IntegrationMethod::Negative => {
            integrator.integrate(&library, &spec.family, &params, args.theta)
        }
        IntegrationMethod::PointMasses => integrator.integrate_with_point_masses(
            &mut library,
            &spec.family,
            &params,
            args.point_masses,
            args.theta,
            None,
        ),
        IntegrationMethod::Continuous => {
            integrator.integrate_continuous_positive(&library, &spec.family, &params, args.theta)
        }
    }
    .map_err(compute_error)?;

    if !outcome.warnings.is_empty() {
        warn!(
            count = outcome.warnings.len(),
            "exterior quadrature did not fully converge"
        );
    }

    print_json(&IntegrateReport {
        density: spec.name,
        method: method.as_str(),
        params: &params,
        theta: args.theta,
        total: outcome.spectrum.total(),
        outcome,
    })?;
    Ok(0)
}
