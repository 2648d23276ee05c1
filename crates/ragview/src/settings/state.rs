use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use ragview_client::{
    BackendConfig, DEFAULT_API_BASE_URL, DEFAULT_BATCH_INGEST_PATH, DEFAULT_INGEST_PATH,
    DEFAULT_QUERY_PATH,
};
use ragview_pdf::DEFAULT_DISPLAY_SCALE;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tempfile::NamedTempFile;

use crate::preview::ArtifactLocator;

pub const SETTINGS_DIRECTORY_NAME: &str = "ragview";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Host serving stored artifacts; blank means the API host.
    #[serde(default)]
    pub storage_base_url: String,
    #[serde(default = "default_query_path")]
    pub query_path: String,
    #[serde(default = "default_ingest_path")]
    pub ingest_path: String,
    #[serde(default = "default_batch_ingest_path")]
    pub batch_ingest_path: String,
    #[serde(default = "default_pdf_render_scale")]
    pub pdf_render_scale: f32,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            storage_base_url: String::new(),
            query_path: default_query_path(),
            ingest_path: default_ingest_path(),
            batch_ingest_path: default_batch_ingest_path(),
            pdf_render_scale: default_pdf_render_scale(),
            request_timeout_secs: None,
        }
    }
}

impl ClientSettings {
    pub fn normalized(mut self) -> Self {
        self.api_base_url = non_blank_or(self.api_base_url, default_api_base_url);
        self.storage_base_url = self.storage_base_url.trim().to_string();
        self.query_path = non_blank_or(self.query_path, default_query_path);
        self.ingest_path = non_blank_or(self.ingest_path, default_ingest_path);
        self.batch_ingest_path = non_blank_or(self.batch_ingest_path, default_batch_ingest_path);
        if !self.pdf_render_scale.is_finite() || self.pdf_render_scale <= 0.0 {
            self.pdf_render_scale = default_pdf_render_scale();
        }
        self.request_timeout_secs = self.request_timeout_secs.filter(|secs| *secs > 0);

        self
    }

    pub fn storage_base(&self) -> &str {
        if self.storage_base_url.is_empty() {
            &self.api_base_url
        } else {
            &self.storage_base_url
        }
    }

    pub fn to_backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(&self.api_base_url);
        config.query_path = self.query_path.clone();
        config.ingest_path = self.ingest_path.clone();
        config.batch_ingest_path = self.batch_ingest_path.clone();
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn locator(&self) -> ArtifactLocator {
        ArtifactLocator::new(self.storage_base())
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".ragview"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::read_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    /// Normalizes `settings`, writes them to disk, then publishes them to readers.
    pub fn update(&self, settings: ClientSettings) -> Result<(), SettingsError> {
        let settings = settings.normalized();
        self.write_to_disk(&settings)?;
        self.settings.store(Arc::new(settings));
        Ok(())
    }

    /// Built-in defaults overlaid with whatever keys the file sets.
    ///
    /// A missing or unreadable file yields the defaults.
    fn read_from_disk(path: &Path) -> ClientSettings {
        if !path.is_file() {
            tracing::info!(path = %path.display(), "no settings file, using built-in defaults");
            return ClientSettings::default();
        }

        Figment::from(Serialized::defaults(ClientSettings::default()))
            .merge(Json::file(path))
            .extract::<ClientSettings>()
            .map(ClientSettings::normalized)
            .unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), %error, "ignoring unreadable settings file");
                ClientSettings::default()
            })
    }

    /// Stages the JSON in a sibling temp file and swaps it in, so readers never see a partial file.
    fn write_to_disk(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        let directory = self
            .config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(directory).context(CreateSettingsDirSnafu {
            stage: "create-settings-dir",
            path: directory,
        })?;

        let mut staged = NamedTempFile::new_in(directory).context(StageSettingsSnafu {
            stage: "stage-settings",
            path: directory,
        })?;
        serde_json::to_writer_pretty(&mut staged, settings).context(EncodeSettingsSnafu {
            stage: "encode-settings",
        })?;
        staged
            .persist(&self.config_path)
            .map_err(|error| error.error)
            .context(CommitSettingsSnafu {
                stage: "commit-settings",
                path: &self.config_path,
            })?;

        tracing::info!(
            path = %self.config_path.display(),
            api = %settings.api_base_url,
            "settings saved"
        );
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create settings directory {} (`{stage}`): {source}", path.display()))]
    CreateSettingsDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot stage new settings in {} (`{stage}`): {source}", path.display()))]
    StageSettings {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode settings as JSON (`{stage}`): {source}"))]
    EncodeSettings {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot replace settings file {} (`{stage}`): {source}", path.display()))]
    CommitSettings {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_query_path() -> String {
    DEFAULT_QUERY_PATH.to_string()
}

fn default_ingest_path() -> String {
    DEFAULT_INGEST_PATH.to_string()
}

fn default_batch_ingest_path() -> String {
    DEFAULT_BATCH_INGEST_PATH.to_string()
}

fn default_pdf_render_scale() -> f32 {
    DEFAULT_DISPLAY_SCALE
}
