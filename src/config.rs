//! Service configuration: an optional JSON file overlaid with `CERTFORGE_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::convert::BackendId;
use crate::error::RenderError;
use crate::pipeline::PipelineConfig;

pub const ENV_PREFIX: &str = "CERTFORGE";
pub const ENV_TEMPLATE: &str = "CERTFORGE_TEMPLATE";
pub const ENV_WORK_DIR: &str = "CERTFORGE_WORK_DIR";
pub const ENV_SOFFICE: &str = "CERTFORGE_SOFFICE";
pub const ENV_CONVERT_TIMEOUT: &str = "CERTFORGE_CONVERT_TIMEOUT_SECS";
pub const ENV_DISABLE_BACKENDS: &str = "CERTFORGE_DISABLE_BACKENDS";

/// Where LibreOffice usually lives, in the order they are tried.
pub const DEFAULT_EXECUTABLES: [&str; 6] = [
    "libreoffice",
    "soffice",
    "/usr/bin/libreoffice",
    "/usr/bin/soffice",
    "/opt/libreoffice/program/soffice",
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// The certificate template (HTML).
    pub template_path: PathBuf,
    /// Directory for per-request intermediate and final files.
    pub work_dir: PathBuf,
    pub backend_order: Vec<BackendId>,
    pub native: NativeConfig,
    pub external: ExternalConfig,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    pub enabled: bool,
    pub page: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub executables: Vec<PathBuf>,
    pub probe_timeout_secs: u64,
    pub convert_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("templates/certificate.html"),
            work_dir: std::env::temp_dir().join("certforge"),
            backend_order: BackendId::DEFAULT_ORDER.to_vec(),
            native: NativeConfig::default(),
            external: ExternalConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page: PipelineConfig::a4_landscape(),
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executables: DEFAULT_EXECUTABLES.iter().map(PathBuf::from).collect(),
            probe_timeout_secs: 10,
            convert_timeout_secs: 30,
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ExternalConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }
}

/// Keys that do not sit on a `ServiceConfig` field path. They are read from
/// the same layered source and applied after deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Shortcuts {
    template: Option<PathBuf>,
    soffice: Option<PathBuf>,
    convert_timeout_secs: Option<u64>,
    disable_backends: Option<String>,
}

impl ServiceConfig {
    /// Parse a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let file = File::from(path).format(FileFormat::Json).required(true);
        Self::build(Config::builder().add_source(file))
    }

    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        Self::build(Config::builder().add_source(File::from_str(json, FileFormat::Json)))
    }

    /// Defaults, then `path` when given, then the `CERTFORGE_*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self, RenderError> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// [`load`](Self::load) with the environment source supplied by the
    /// caller, so tests can hand in a fixed variable map.
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, RenderError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
        }
        // CERTFORGE_WORK_DIR -> work_dir, CERTFORGE_EXTERNAL__ENABLED -> external.enabled
        builder = builder.add_source(env.prefix_separator("_").separator("__"));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, RenderError> {
        let layered = builder.build()?;
        let shortcuts: Shortcuts = layered.clone().try_deserialize()?;
        let mut config: ServiceConfig = layered.try_deserialize()?;
        config.apply_shortcuts(shortcuts)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_shortcuts(&mut self, shortcuts: Shortcuts) -> Result<(), RenderError> {
        if let Some(template) = shortcuts.template {
            self.template_path = template;
        }
        if let Some(exe) = shortcuts.soffice {
            // An explicit executable is tried before the usual locations.
            self.external.executables.retain(|e| e != &exe);
            self.external.executables.insert(0, exe);
        }
        if let Some(secs) = shortcuts.convert_timeout_secs {
            self.external.convert_timeout_secs = secs;
        }
        if let Some(list) = shortcuts.disable_backends {
            for name in list.split(',').filter(|s| !s.trim().is_empty()) {
                let id = BackendId::parse(name)
                    .ok_or_else(|| RenderError::Config(format!("unknown backend {name:?}")))?;
                self.set_enabled(id, false);
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self, id: BackendId) -> bool {
        match id {
            BackendId::Native => self.native.enabled,
            BackendId::External => self.external.enabled,
            BackendId::Synthetic => self.synthetic.enabled,
        }
    }

    pub fn set_enabled(&mut self, id: BackendId, enabled: bool) {
        match id {
            BackendId::Native => self.native.enabled = enabled,
            BackendId::External => self.external.enabled = enabled,
            BackendId::Synthetic => self.synthetic.enabled = enabled,
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.external.convert_timeout_secs == 0 {
            return Err(RenderError::Config(
                "external.convert_timeout_secs must be positive".into(),
            ));
        }
        for (i, id) in self.backend_order.iter().enumerate() {
            if self.backend_order[..i].contains(id) {
                return Err(RenderError::Config(format!("backend {id} listed twice")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let vars: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(vars))
    }

    #[test]
    fn defaults_try_every_backend_in_order() {
        let config = ServiceConfig::default();
        assert_eq!(config.backend_order, BackendId::DEFAULT_ORDER.to_vec());
        assert_eq!(config.external.executables[0], PathBuf::from("libreoffice"));
        assert_eq!(config.external.convert_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_layers_give_defaults() {
        let config = ServiceConfig::load_with(None, env(&[])).unwrap();
        assert_eq!(config.backend_order, BackendId::DEFAULT_ORDER.to_vec());
        assert_eq!(config.template_path, ServiceConfig::default().template_path);
        assert!(config.native.enabled);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ServiceConfig::from_json(
            r#"{ "work_dir": "/srv/certs", "external": { "convert_timeout_secs": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/srv/certs"));
        assert_eq!(config.external.convert_timeout_secs, 5);
        assert_eq!(config.external.probe_timeout_secs, 10);
        assert!(config.synthetic.enabled);
    }

    #[test]
    fn environment_overrides() {
        let config = ServiceConfig::load_with(
            None,
            env(&[
                (ENV_TEMPLATE, "/srv/cert.html"),
                (ENV_SOFFICE, "/custom/soffice"),
                (ENV_CONVERT_TIMEOUT, "7"),
                (ENV_DISABLE_BACKENDS, "native, external"),
            ]),
        )
        .unwrap();
        assert_eq!(config.template_path, PathBuf::from("/srv/cert.html"));
        assert_eq!(config.external.executables[0], PathBuf::from("/custom/soffice"));
        assert_eq!(config.external.convert_timeout_secs, 7);
        assert!(!config.is_enabled(BackendId::Native));
        assert!(!config.is_enabled(BackendId::External));
        assert!(config.is_enabled(BackendId::Synthetic));
    }

    #[test]
    fn environment_wins_over_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{ "work_dir": "/from/file", "external": {{ "probe_timeout_secs": 3 }} }}"#
        )
        .unwrap();

        let config = ServiceConfig::load_with(
            Some(file.path()),
            env(&[
                (ENV_WORK_DIR, "/from/env"),
                ("CERTFORGE_EXTERNAL__ENABLED", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/from/env"));
        assert_eq!(config.external.probe_timeout_secs, 3);
        assert!(!config.external.enabled);
    }

    #[test]
    fn soffice_override_is_not_listed_twice() {
        let config =
            ServiceConfig::load_with(None, env(&[(ENV_SOFFICE, "soffice")])).unwrap();
        assert_eq!(config.external.executables[0], PathBuf::from("soffice"));
        let count = config
            .external
            .executables
            .iter()
            .filter(|e| e.as_path() == Path::new("soffice"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = ServiceConfig::load_with(None, env(&[(ENV_DISABLE_BACKENDS, "docx2pdf")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ServiceConfig::load_with(None, env(&[(ENV_CONVERT_TIMEOUT, "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ServiceConfig::load_with(None, env(&[(ENV_CONVERT_TIMEOUT, "0")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ServiceConfig::from_json(r#"{ "backend_order": ["native", "native"] }"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServiceConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
