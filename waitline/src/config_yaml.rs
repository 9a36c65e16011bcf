use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use waitline_core::{BehaviorConfig, RegisterConfig, ScenarioConfig};

/// Scenario file. Every key is optional; present keys override the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ConfigYaml {
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub concert_id: Option<u64>,
    pub vus: Option<u64>,
    #[serde(default)]
    pub max_duration: Option<YamlDuration>,
    /// In time units.
    pub admission_timeout: Option<f64>,
    #[serde(default)]
    pub time_unit: Option<YamlDuration>,
    #[serde(default)]
    pub http_timeout: Option<YamlDuration>,
    pub username_prefix: Option<String>,
    pub password: Option<String>,
    pub seed: Option<u64>,
    pub search_keywords: Option<Vec<String>>,
    pub behavior: Option<BehaviorConfig>,
    pub accounts: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v <= 0 {
                    return Err(E::custom("duration must be positive"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v <= 0.0 {
                    return Err(E::custom("duration must be a positive, finite number"));
                }
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(E::custom)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) async fn load_config_yaml(path: &Path) -> anyhow::Result<ConfigYaml> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config YAML: {}", path.display()))?;

    // An empty file is a valid, empty override set.
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConfigYaml::default());
    }

    serde_yaml::from_slice(&bytes).with_context(|| format!("failed to parse YAML: {}", path.display()))
}

impl ConfigYaml {
    pub(crate) fn apply(self, cfg: &mut ScenarioConfig) {
        let Self {
            base_url,
            ws_url,
            concert_id,
            vus,
            max_duration,
            admission_timeout,
            time_unit,
            http_timeout,
            username_prefix,
            password,
            seed,
            search_keywords,
            behavior,
            accounts: _,
        } = self;

        if let Some(v) = base_url {
            cfg.base_url = v;
        }
        if let Some(v) = ws_url {
            cfg.ws_url = v;
        }
        if let Some(v) = concert_id {
            cfg.concert_id = v;
        }
        if let Some(v) = vus {
            cfg.vus = v;
        }
        if let Some(v) = max_duration {
            cfg.max_duration = v.into_inner();
        }
        if let Some(v) = admission_timeout {
            cfg.admission_timeout_units = v;
        }
        if let Some(v) = time_unit {
            cfg.time_unit = v.into_inner();
        }
        if let Some(v) = http_timeout {
            cfg.http_timeout = Some(v.into_inner());
        }
        if let Some(v) = username_prefix {
            cfg.username_prefix = v;
        }
        if let Some(v) = password {
            cfg.password = v;
        }
        if seed.is_some() {
            cfg.seed = seed;
        }
        if let Some(v) = search_keywords {
            cfg.search_keywords = v.into();
        }
        if let Some(v) = behavior {
            cfg.behavior = v;
        }
    }

    pub(crate) fn apply_register(self, cfg: &mut RegisterConfig) {
        if let Some(v) = self.accounts {
            cfg.accounts = v;
        }
    }
}
