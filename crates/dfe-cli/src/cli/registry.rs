use dfe_core::density::DensityFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(super) enum IntegrationMethod {
    /// Deleterious gammas only, density over selection strength
    Negative,
    /// Deleterious density mixed with discrete (proportion, gamma) pairs
    PointMasses,
    /// Deleterious and beneficial gammas, density over signed gamma
    Continuous,
}

impl IntegrationMethod {
    pub(super) const fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::PointMasses => "point-masses",
            Self::Continuous => "continuous",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct DensitySpec {
    pub(super) name: &'static str,
    pub(super) family: DensityFamily,
    pub(super) default_method: IntegrationMethod,
}

impl DensitySpec {
    pub(super) const fn param_count(&self) -> usize {
        self.family.param_count()
    }
}

pub(super) const DENSITY_SPECS: [DensitySpec; 6] = [
    DensitySpec {
        name: "gamma",
        family: DensityFamily::Gamma,
        default_method: IntegrationMethod::Negative,
    },
    DensitySpec {
        name: "lognormal",
        family: DensityFamily::Lognormal,
        default_method: IntegrationMethod::Negative,
    },
    DensitySpec {
        name: "neugamma",
        family: DensityFamily::Neugamma,
        default_method: IntegrationMethod::Negative,
    },
    DensitySpec {
        name: "gammalet",
        family: DensityFamily::Gammalet,
        default_method: IntegrationMethod::Negative,
    },
    DensitySpec {
        name: "neugammalet",
        family: DensityFamily::Neugammalet,
        default_method: IntegrationMethod::Negative,
    },
    DensitySpec {
        name: "shifted_gamma",
        family: DensityFamily::ShiftedGamma,
        default_method: IntegrationMethod::Continuous,
    },
];

pub(super) fn density_spec(name: &str) -> Option<DensitySpec> {
    DENSITY_SPECS
        .iter()
        .copied()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

pub(super) fn density_names() -> Vec<&'static str> {
    DENSITY_SPECS.iter().map(|spec| spec.name).collect()
}
