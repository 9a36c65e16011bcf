//! Settings precedence: built-in defaults < YAML file < flags / `WAITLINE_*` env vars.

use waitline_core::{RegisterConfig, ScenarioConfig};

use crate::cli::{CommonArgs, RegisterArgs, RunArgs};
use crate::config_yaml::{ConfigYaml, load_config_yaml};
use crate::run_error::RunError;

const DEFAULT_ACCOUNTS: u64 = 100;

async fn load_yaml(common: &CommonArgs) -> Result<ConfigYaml, RunError> {
    match &common.config {
        Some(path) => load_config_yaml(path).await.map_err(RunError::InvalidInput),
        None => Ok(ConfigYaml::default()),
    }
}

fn apply_common(common: &CommonArgs, cfg: &mut ScenarioConfig) {
    if let Some(v) = &common.base_url {
        cfg.base_url = v.clone();
    }
    if let Some(v) = &common.username_prefix {
        cfg.username_prefix = v.clone();
    }
    if let Some(v) = &common.password {
        cfg.password = v.clone();
    }
    if let Some(v) = common.max_duration {
        cfg.max_duration = v;
    }
    if let Some(v) = common.time_unit {
        cfg.time_unit = v;
    }
    if let Some(v) = common.http_timeout {
        cfg.http_timeout = Some(v);
    }
}

fn apply_run(args: &RunArgs, cfg: &mut ScenarioConfig) {
    apply_common(&args.common, cfg);
    if let Some(v) = &args.ws_url {
        cfg.ws_url = v.clone();
    }
    if let Some(v) = args.concert_id {
        cfg.concert_id = v;
    }
    if let Some(v) = args.vus {
        cfg.vus = v;
    }
    if let Some(v) = args.admission_timeout {
        cfg.admission_timeout_units = v;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
}

pub(crate) async fn scenario_config(args: &RunArgs) -> Result<ScenarioConfig, RunError> {
    let mut cfg = ScenarioConfig::default();
    load_yaml(&args.common).await?.apply(&mut cfg);
    apply_run(args, &mut cfg);

    cfg.validate()
        .map_err(|e| RunError::InvalidInput(anyhow::Error::new(e).context("invalid run configuration")))?;
    Ok(cfg)
}

pub(crate) async fn register_config(args: &RegisterArgs) -> Result<RegisterConfig, RunError> {
    let yaml = load_yaml(&args.common).await?;

    let mut scenario = ScenarioConfig::default();
    yaml.clone().apply(&mut scenario);
    apply_common(&args.common, &mut scenario);

    let mut cfg = scenario.registration(DEFAULT_ACCOUNTS);
    yaml.apply_register(&mut cfg);
    if let Some(v) = args.accounts {
        cfg.accounts = v;
    }

    cfg.validate().map_err(|e| {
        RunError::InvalidInput(anyhow::Error::new(e).context("invalid registration configuration"))
    })?;
    Ok(cfg)
}
