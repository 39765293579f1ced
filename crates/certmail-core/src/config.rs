//! Configuration management for certmail

use serde::{Deserialize, Serialize};
use crate::constants::NAME_PLACEHOLDER;
use crate::error::{CertmailError, Result};
use image::Rgba;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `CERTMAIL__LAYOUT__NAME_X_CM=9.5`
pub const ENV_PREFIX: &str = "CERTMAIL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertmailConfig {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    /// Certificate number stamp; disabled when absent
    #[serde(default)]
    pub serial: Option<SerialConfig>,

    pub smtp: SmtpConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

/// Placement of the recipient name on the template, in centimeters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(alias = "NAME_X_CM", default = "default_name_x_cm")]
    pub name_x_cm: f64,

    #[serde(alias = "NAME_Y_CM", default = "default_name_y_cm")]
    pub name_y_cm: f64,

    #[serde(alias = "TEXT_BOX_WIDTH_CM", default = "default_text_box_width_cm")]
    pub text_box_width_cm: f64,

    /// Optional vertical bound for the fitted text; placement stays anchored
    #[serde(alias = "TEXT_BOX_HEIGHT_CM", default)]
    pub text_box_height_cm: Option<f64>,

    #[serde(alias = "MIN_FONT_SIZE", default = "default_min_font_size")]
    pub min_font_size: u32,

    #[serde(alias = "DEFAULT_FONT_SIZE", default = "default_max_font_size")]
    pub max_font_size: u32,

    /// Text color as `#RRGGBB`
    #[serde(default = "default_text_color")]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(alias = "TEMPLATE_PATH", default = "default_template_path")]
    pub template_path: PathBuf,

    #[serde(alias = "FONT_PATH", default = "default_font_path")]
    pub font_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub prefix: String,

    /// Plain face for the number; the name font is usually a script face
    pub font_path: PathBuf,

    #[serde(default = "default_serial_font_size")]
    pub font_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(alias = "gmail_address")]
    pub username: String,

    #[serde(alias = "gmail_app_password")]
    pub password: String,

    /// Defaults to `username` when not set
    #[serde(default)]
    pub from_address: Option<String>,

    #[serde(default)]
    pub from_name: Option<String>,

    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub fn sender_address(&self) -> &str {
        self.from_address.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of sends in flight
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay before the first retry, doubled for each further retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause each worker takes after finishing a send
    #[serde(alias = "EMAIL_DELAY_MS", default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_subject")]
    pub subject: String,

    #[serde(default = "default_email_body")]
    pub body: String,

    /// Attach the PNG snapshot next to the PDF
    #[serde(default)]
    pub attach_preview_png: bool,
}

// Default functions
fn default_name_x_cm() -> f64 {
    8.62
}

fn default_name_y_cm() -> f64 {
    9.21
}

fn default_text_box_width_cm() -> f64 {
    18.81
}

fn default_min_font_size() -> u32 {
    36
}

fn default_max_font_size() -> u32 {
    72
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates/certificate_template.png")
}

fn default_font_path() -> PathBuf {
    PathBuf::from("fonts/AlexBrush-Regular.ttf")
}

fn default_serial_font_size() -> u32 {
    28
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    crate::constants::DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_send_interval_ms() -> u64 {
    1000
}

fn default_email_subject() -> String {
    format!("Your certificate, {}", NAME_PLACEHOLDER)
}

fn default_email_body() -> String {
    format!("Hi {},\n\nPlease find your certificate attached.\n", NAME_PLACEHOLDER)
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            name_x_cm: default_name_x_cm(),
            name_y_cm: default_name_y_cm(),
            text_box_width_cm: default_text_box_width_cm(),
            text_box_height_cm: None,
            min_font_size: default_min_font_size(),
            max_font_size: default_max_font_size(),
            color: default_text_color(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            font_path: default_font_path(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            send_interval_ms: default_send_interval_ms(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            subject: default_email_subject(),
            body: default_email_body(),
            attach_preview_png: false,
        }
    }
}

impl LayoutConfig {
    /// Parse `color` into an opaque RGBA pixel
    pub fn color_rgba(&self) -> Result<Rgba<u8>> {
        parse_hex_color(&self.color)
    }
}

/// Parse `#RRGGBB` (leading `#` optional) into an opaque pixel
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CertmailError::Config(format!("Invalid color '{}', expected #RRGGBB", value)));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|e| CertmailError::Config(format!("Invalid color '{}': {}", value, e)))
    };

    Ok(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

impl CertmailConfig {
    /// Load configuration from a JSON file, then apply `CERTMAIL__*`
    /// environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CertmailError::Config(format!(
                "Failed to read config file: {} does not exist",
                path.display()
            )));
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Json))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CertmailError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.smtp.username.trim().is_empty() {
            return Err(CertmailError::Config("SMTP username is required".to_string()));
        }

        if self.smtp.password.is_empty() {
            return Err(CertmailError::Config("SMTP password is required".to_string()));
        }

        let layout = &self.layout;
        for (key, value) in [
            ("name_x_cm", layout.name_x_cm),
            ("name_y_cm", layout.name_y_cm),
            ("text_box_width_cm", layout.text_box_width_cm),
        ] {
            if !value.is_finite() {
                return Err(CertmailError::Config(format!("layout.{} must be a finite number", key)));
            }
        }

        if layout.text_box_width_cm <= 0.0 {
            return Err(CertmailError::Config(
                "layout.text_box_width_cm is required and must be positive".to_string(),
            ));
        }

        if let Some(height) = layout.text_box_height_cm {
            if !height.is_finite() || height <= 0.0 {
                return Err(CertmailError::Config(
                    "layout.text_box_height_cm must be positive when set".to_string(),
                ));
            }
        }

        if layout.min_font_size == 0 {
            return Err(CertmailError::Config("layout.min_font_size must be at least 1".to_string()));
        }

        if layout.min_font_size > layout.max_font_size {
            return Err(CertmailError::Config(format!(
                "layout.min_font_size ({}) must not exceed max_font_size ({})",
                layout.min_font_size, layout.max_font_size
            )));
        }

        layout.color_rgba()?;

        if let Some(serial) = &self.serial {
            if serial.prefix.trim().is_empty() {
                return Err(CertmailError::Config("serial.prefix is required when serial is set".to_string()));
            }
            if serial.font_size == 0 {
                return Err(CertmailError::Config("serial.font_size must be at least 1".to_string()));
            }
        }

        if self.dispatch.workers == 0 {
            return Err(CertmailError::Config("dispatch.workers must be at least 1".to_string()));
        }

        Ok(())
    }
}
