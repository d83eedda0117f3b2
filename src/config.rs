use color_eyre::eyre::eyre;
use color_eyre::Result;
use questview_cli::Args;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::gateway::{GatewayConfig, DEFAULT_IDENTITY_COLUMN, DEFAULT_INFER_SCHEMA_LENGTH};
use crate::paging::PageLimits;

pub const CONFIG_VERSION: &str = "0.1";
pub const DEFAULT_CSV_PATH: &str = "data/sample_questions.csv";
pub const DEFAULT_APP_TITLE: &str = "BLISS: Internet-scale Questions Dataset";
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 500;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file within the config directory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate the default configuration as a commented TOML string.
    /// Every field is commented out so defaults apply until the user uncomments one.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        Self::comment_all_fields(toml_str, Self::collect_all_comments())
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();

        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        for (field, comment) in SOURCE_COMMENTS {
            comments.insert(format!("source.{}", field), comment.to_string());
        }
        for (field, comment) in PAGING_COMMENTS {
            comments.insert(format!("paging.{}", field), comment.to_string());
        }
        for (field, comment) in APP_SECTION_COMMENTS {
            comments.insert(format!("app.{}", field), comment.to_string());
        }

        comments
    }

    /// Comment out all fields in TOML and add comments.
    /// Option fields that serialize to nothing are added back as `# field = null`.
    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# questview configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push_str("# Environment variables CSV_PATH, DEFAULT_PAGE_SIZE and MAX_PAGE_SIZE\n");
        result.push_str("# override values set here; command-line flags override both.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                current_section = section.clone();

                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Self::add_missing_option_fields(result, &comments, &seen_fields)
    }

    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        let option_fields = ["source.delimiter"];

        for field_path in option_fields {
            if seen_fields.contains(field_path) || !comments.contains_key(field_path) {
                continue;
            }
            let Some((section, field_name)) = field_path.split_once('.') else {
                continue;
            };
            let section_header = format!("# [{}]", section);
            let Some(section_pos) = result.find(&section_header) else {
                continue;
            };
            let after_header_start = section_pos + section_header.len();
            let newline_pos = result[after_header_start..].find('\n').unwrap_or(0);
            let insert_pos = after_header_start + newline_pos + 1;

            let mut new_content = String::new();
            if let Some(comment) = comments.get(field_path) {
                for comment_line in comment.lines() {
                    new_content.push_str("# ");
                    new_content.push_str(comment_line);
                    new_content.push('\n');
                }
            }
            new_content.push_str(&format!("# {} = null\n", field_name));
            result.insert_str(insert_pos, &new_content);
        }

        result
    }

    /// Extract section name from TOML line like "[paging]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }

        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

/// Complete application configuration, as read from the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub source: SourceConfig,
    pub paging: PagingConfig,
    pub app: AppInfoConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "source",
        "# ============================================================================\n# Data Source\n# ============================================================================",
    ),
    (
        "paging",
        "# ============================================================================\n# Paging\n# ============================================================================",
    ),
    (
        "app",
        "# ============================================================================\n# Application\n# ============================================================================",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// CSV file to serve. Relative paths resolve against the working directory.
    pub path: String,
    pub identity_column: String,
    pub delimiter: Option<u8>,
    pub infer_schema_length: usize,
}

const SOURCE_COMMENTS: &[(&str, &str)] = &[
    (
        "path",
        "CSV file to serve (gzip, zstd, bzip2 and xz compressed files are also accepted)\nA leading ~ expands to the home directory",
    ),
    (
        "identity_column",
        "Column whose values identify a row; only the first row for each value is kept",
    ),
    (
        "delimiter",
        "Field delimiter as an ASCII value (e.g. 59 for ';')\nnull = comma",
    ),
    (
        "infer_schema_length",
        "Number of rows sampled when inferring column types",
    ),
];

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_CSV_PATH.to_string(),
            identity_column: DEFAULT_IDENTITY_COLUMN.to_string(),
            delimiter: None,
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }
}

impl SourceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = SourceConfig::default();
        if other.path != default.path {
            self.path = other.path;
        }
        if other.identity_column != default.identity_column {
            self.identity_column = other.identity_column;
        }
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.infer_schema_length != default.infer_schema_length {
            self.infer_schema_length = other.infer_schema_length;
        }
    }
}

/// Page sizes as configured. Out-of-range values are clamped when settings are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

const PAGING_COMMENTS: &[(&str, &str)] = &[
    (
        "default_page_size",
        "Rows per page when a request does not ask for a page size\nValues below 1 are treated as 1; values above max_page_size are lowered to it",
    ),
    (
        "max_page_size",
        "Largest page size a request may ask for (values below 1 are treated as 1)",
    ),
];

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl PagingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PagingConfig::default();
        if other.default_page_size != default.default_page_size {
            self.default_page_size = other.default_page_size;
        }
        if other.max_page_size != default.max_page_size {
            self.max_page_size = other.max_page_size;
        }
    }

    /// Clamp both sizes to at least 1 and the default to at most the maximum.
    pub fn limits(&self) -> PageLimits {
        let max_page_size = self.max_page_size.max(1) as usize;
        let default_page_size = (self.default_page_size.max(1) as usize).min(max_page_size);
        PageLimits {
            default_page_size,
            max_page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfoConfig {
    pub title: String,
}

const APP_SECTION_COMMENTS: &[(&str, &str)] =
    &[("title", "Title reported alongside dataset metadata")];

impl Default for AppInfoConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_APP_TITLE.to_string(),
        }
    }
}

impl AppInfoConfig {
    pub fn merge(&mut self, other: Self) {
        if other.title != AppInfoConfig::default().title {
            self.title = other.title;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            source: SourceConfig::default(),
            paging: PagingConfig::default(),
            app: AppInfoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults and the config file.
    ///
    /// An explicit `config_file` must exist. Without one, the user config in the
    /// app's config directory is used when present.
    pub fn load(app_name: &str, config_file: Option<&Path>) -> Result<Self> {
        let config_path = match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(eyre!("Config file not found: {}", path.display()));
                }
                Some(path.to_path_buf())
            }
            None => ConfigManager::new(app_name)
                .ok()
                .map(|m| m.config_path("config.toml"))
                .filter(|p| p.is_file()),
        };

        let mut config = AppConfig::default();
        if let Some(path) = &config_path {
            config.merge(Self::load_file(path)?);
        }

        config.validate().map_err(|e| {
            let path_hint = config_path
                .as_ref()
                .map(|p| format!(" in {}", p.display()))
                .unwrap_or_default();
            eyre!("Invalid configuration{}: {}", path_hint, e)
        })?;

        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file at {}: {}", path.display(), e))?;

        toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file at {}: {}", path.display(), e))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.source.merge(other.source);
        self.paging.merge(other.paging);
        self.app.merge(other.app);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with(CONFIG_VERSION) {
            return Err(eyre!(
                "Unsupported config version: {}. Expected {}.x",
                self.version,
                CONFIG_VERSION
            ));
        }
        if self.source.identity_column.trim().is_empty() {
            return Err(eyre!("source.identity_column must not be empty"));
        }
        if self.source.infer_schema_length == 0 {
            return Err(eyre!("source.infer_schema_length must be greater than 0"));
        }
        Ok(())
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `CSV_PATH`, `DEFAULT_PAGE_SIZE` and `MAX_PAGE_SIZE` as looked up by `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CSV_PATH") {
            self.source.path = path;
        }
        if let Some(n) = parse_int_var(&lookup, "DEFAULT_PAGE_SIZE")? {
            self.paging.default_page_size = n;
        }
        if let Some(n) = parse_int_var(&lookup, "MAX_PAGE_SIZE")? {
            self.paging.max_page_size = n;
        }
        Ok(())
    }

    /// Apply command-line overrides, which take precedence over every other layer.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(path) = &args.csv_path {
            self.source.path = path.display().to_string();
        }
        if let Some(column) = &args.identity_column {
            self.source.identity_column = column.clone();
        }
        if args.delimiter.is_some() {
            self.source.delimiter = args.delimiter;
        }
        if let Some(n) = args.infer_schema_length {
            self.source.infer_schema_length = n;
        }
        if let Some(n) = args.default_page_size {
            self.paging.default_page_size = i64::try_from(n).unwrap_or(i64::MAX);
        }
        if let Some(n) = args.max_page_size {
            self.paging.max_page_size = i64::try_from(n).unwrap_or(i64::MAX);
        }
    }
}

fn parse_int_var<F>(lookup: &F, name: &str) -> Result<Option<i64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| eyre!("Environment variable {} must be an integer", name)),
    }
}

/// Fully resolved runtime settings. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Absolute path of the source file
    pub csv_path: PathBuf,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub app_title: String,
    pub identity_column: String,
    pub delimiter: u8,
    pub infer_schema_length: usize,
}

impl Settings {
    /// Resolve every layer: defaults, config file, environment, then command line.
    pub fn load(app_name: &str, args: &Args) -> Result<Self> {
        let mut config = AppConfig::load(app_name, args.config.as_deref())?;
        config.apply_env()?;
        config.apply_args(args);
        Self::from_config(&config)
    }

    /// Normalize a merged config. Fails if the source file does not exist.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let csv_path = resolve_path(&config.source.path)?;
        if !csv_path.exists() {
            return Err(eyre!(
                "CSV file not found at {}. Set the CSV_PATH environment variable to a valid file.",
                csv_path.display()
            ));
        }

        let limits = config.paging.limits();
        Ok(Self {
            csv_path,
            default_page_size: limits.default_page_size,
            max_page_size: limits.max_page_size,
            app_title: config.app.title.clone(),
            identity_column: config.source.identity_column.clone(),
            delimiter: config.source.delimiter.unwrap_or(b','),
            infer_schema_length: config.source.infer_schema_length,
        })
    }

    /// File name of the source, for display.
    pub fn csv_display_name(&self) -> String {
        self.csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.csv_path.display().to_string())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(&self.csv_path)
            .with_identity_column(&self.identity_column)
            .with_delimiter(self.delimiter)
            .with_infer_schema_length(self.infer_schema_length)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

/// Expand a leading `~` and make the path absolute.
fn resolve_path(raw: &str) -> Result<PathBuf> {
    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = dirs::home_dir().ok_or_else(|| eyre!("Could not determine home directory"))?;
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(raw),
    };
    Ok(std::path::absolute(&expanded)?)
}
