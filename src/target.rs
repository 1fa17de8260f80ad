use crate::config::{AppConfig, TargetConfig};
use crate::model::{QuoteConvention, Schedule, SourceKind, Target};

impl Target {
    /// Build all `Target`s from a validated `AppConfig`, in configuration order.
    pub fn from_config(config: &AppConfig) -> Vec<Self> {
        config.targets.iter().filter_map(build_target).collect()
    }
}

fn build_target(target: &TargetConfig) -> Option<Target> {
    let source = SourceKind::from_str(&target.source)?;
    let convention = QuoteConvention::from_str(&target.convention)?;
    let schedule = Schedule::from_str(&target.schedule)?;

    let code = target
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    Some(Target {
        id: target.id.clone(),
        name: target.name.clone(),
        source,
        code,
        convention,
        target_price: target.target_price,
        note: target.note.clone(),
        schedule,
    })
}
