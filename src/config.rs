use crate::error::AppError;
use crate::models::UserPreferences;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "energy-advisor";
const ENV_PREFIX: &str = "ENERGY_ADVISOR";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("ENERGY_ADVISOR_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "energy-advisor", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".energy-advisor"))
}

/// Default priorities as written in `config.toml`. Keys stay snake_case so
/// environment overrides (`ENERGY_ADVISOR_PREFERENCES__COST_PRIORITY`) line up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSettings {
    pub cost_priority: f64,
    pub renewable_priority: f64,
}

impl Default for PreferenceSettings {
    fn default() -> Self {
        let prefs = UserPreferences::default();
        Self {
            cost_priority: prefs.cost_priority,
            renewable_priority: prefs.renewable_priority,
        }
    }
}

impl From<PreferenceSettings> for UserPreferences {
    fn from(settings: PreferenceSettings) -> Self {
        Self {
            cost_priority: settings.cost_priority,
            renewable_priority: settings.renewable_priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppliers_path: Option<PathBuf>,
    pub catalog_max_age_hours: i64,
    pub preferences: PreferenceSettings,
    pub early_termination_fee: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            suppliers_path: None,
            catalog_max_age_hours: 24,
            preferences: PreferenceSettings::default(),
            early_termination_fee: 0.0,
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn data_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("data"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(data_dir()?)?;
    Ok(())
}

/// Rescale preferences that drifted from summing to 100 and clamp a negative
/// catalog age. Returns whether anything changed.
fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    let prefs = &mut config.preferences;
    let cost = prefs.cost_priority.max(0.0);
    let renewable = prefs.renewable_priority.max(0.0);
    let sum = cost + renewable;
    if (prefs.cost_priority + prefs.renewable_priority - 100.0).abs() > 0.01
        || cost != prefs.cost_priority
        || renewable != prefs.renewable_priority
    {
        *prefs = if sum > 0.0 {
            PreferenceSettings {
                cost_priority: cost / sum * 100.0,
                renewable_priority: renewable / sum * 100.0,
            }
        } else {
            PreferenceSettings::default()
        };
        changed = true;
    }

    if config.catalog_max_age_hours < 0 {
        config.catalog_max_age_hours = 0;
        changed = true;
    }

    changed
}

/// The TOML file (if any) with `ENERGY_ADVISOR_*` environment overrides on top.
fn read_layered(path: &Path) -> Result<AppConfig, AppError> {
    let from_file: AppConfig = if path.exists() {
        toml::from_str(&fs::read_to_string(path)?)?
    } else {
        AppConfig::default()
    };

    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&from_file)?)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    let mut parsed = read_layered(&path)?;

    // Persist the corrected file so the next run starts clean.
    if normalize_config(&mut parsed) && path.exists() {
        save_config(&parsed)?;
    }

    Ok(parsed)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), AppError> {
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    write_config(&config_path()?, config)
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}
