use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub lead_store: LeadStoreConfig,
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub turnstile: TurnstileConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStoreConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Twilio Verify issues and checks the passcode.
    #[default]
    Verify,
    /// Passcode generated locally and delivered through the Messages API.
    Sms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    #[serde(default)]
    pub from_phone: String,
    #[serde(default)]
    pub verify_service_sid: String,
    #[serde(default)]
    pub mode: VerificationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TurnstileConfig {
    pub secret_key: String,
    #[serde(default)]
    pub expected_hostname: Option<String>,
    #[serde(default)]
    pub expected_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Prepended to the 10-digit number before a challenge is issued.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Human support number shown once the phone is verified.
    #[serde(default)]
    pub support_phone: Option<String>,
    #[serde(default = "default_true")]
    pub auto_send_challenge: bool,
    #[serde(default = "default_true")]
    pub auto_confirm_code: bool,
    /// 0 disables the cap.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    /// Upper bound on registration forms held open at once.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            support_phone: None,
            auto_send_challenge: true,
            auto_confirm_code: true,
            max_code_attempts: default_max_code_attempts(),
            call_timeout_secs: default_call_timeout_secs(),
            read_retries: default_read_retries(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    /// Bearer token required by `/api/v1/admin/*`. Empty leaves the routes closed.
    #[serde(default)]
    pub api_token: String,
}

fn default_country_code() -> String {
    "+91".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_code_attempts() -> u32 {
    5
}

fn default_call_timeout_secs() -> u64 {
    20
}

fn default_read_retries() -> u32 {
    2
}

fn default_session_ttl_secs() -> i64 {
    1800
}

fn default_max_sessions() -> usize {
    10_000
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            // File present: parse it, env vars still override below
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env()?,
            Err(e) => {
                return Err(format!("Unable to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let base_url = get_env("LEAD_STORE_URL")
            .ok_or("LEAD_STORE_URL is not set and no config.toml was found")?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            lead_store: LeadStoreConfig {
                base_url,
                api_key: get_env("LEAD_STORE_API_KEY"),
            },
            twilio: TwilioConfig {
                account_sid: get_env("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                auth_token: get_env("TWILIO_AUTH_TOKEN").unwrap_or_default(),
                from_phone: get_env("TWILIO_FROM_PHONE").unwrap_or_default(),
                verify_service_sid: get_env("TWILIO_VERIFY_SERVICE_SID").unwrap_or_default(),
                mode: get_env("TWILIO_MODE")
                    .and_then(|m| parse_mode(&m))
                    .unwrap_or_default(),
            },
            turnstile: TurnstileConfig {
                secret_key: get_env("TURNSTILE_SECRET_KEY").unwrap_or_default(),
                expected_hostname: get_env("TURNSTILE_EXPECTED_HOSTNAME"),
                expected_action: get_env("TURNSTILE_EXPECTED_ACTION"),
            },
            intake: IntakeConfig::default(),
            admin: AdminConfig {
                api_token: get_env("ADMIN_API_TOKEN").unwrap_or_default(),
            },
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("LEAD_STORE_URL") {
            self.lead_store.base_url = v;
        }
        if let Ok(v) = env::var("LEAD_STORE_API_KEY") {
            self.lead_store.api_key = Some(v);
        }
        if let Ok(v) = env::var("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = v;
        }
        if let Ok(v) = env::var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = v;
        }
        if let Ok(v) = env::var("TWILIO_FROM_PHONE") {
            self.twilio.from_phone = v;
        }
        if let Ok(v) = env::var("TWILIO_VERIFY_SERVICE_SID") {
            self.twilio.verify_service_sid = v;
        }
        if let Ok(v) = env::var("TWILIO_MODE")
            && let Some(mode) = parse_mode(&v)
        {
            self.twilio.mode = mode;
        }

        // Turnstile
        if let Ok(v) = env::var("TURNSTILE_SECRET_KEY") {
            self.turnstile.secret_key = v;
        }
        if let Ok(v) = env::var("TURNSTILE_EXPECTED_HOSTNAME") {
            self.turnstile.expected_hostname = Some(v);
        }
        if let Ok(v) = env::var("TURNSTILE_EXPECTED_ACTION") {
            self.turnstile.expected_action = Some(v);
        }

        // Intake behaviour
        if let Ok(v) = env::var("INTAKE_COUNTRY_CODE") {
            self.intake.country_code = v;
        }
        if let Ok(v) = env::var("INTAKE_SUPPORT_PHONE") {
            self.intake.support_phone = Some(v);
        }
        if let Ok(v) = env::var("INTAKE_AUTO_SEND_CHALLENGE")
            && let Ok(b) = v.parse()
        {
            self.intake.auto_send_challenge = b;
        }
        if let Ok(v) = env::var("INTAKE_AUTO_CONFIRM_CODE")
            && let Ok(b) = v.parse()
        {
            self.intake.auto_confirm_code = b;
        }
        if let Ok(v) = env::var("INTAKE_MAX_CODE_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            self.intake.max_code_attempts = n;
        }
        if let Ok(v) = env::var("INTAKE_CALL_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.intake.call_timeout_secs = n;
        }
        if let Ok(v) = env::var("INTAKE_READ_RETRIES")
            && let Ok(n) = v.parse()
        {
            self.intake.read_retries = n;
        }
        if let Ok(v) = env::var("INTAKE_SESSION_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.intake.session_ttl_secs = n;
        }
        if let Ok(v) = env::var("INTAKE_MAX_SESSIONS")
            && let Ok(n) = v.parse()
        {
            self.intake.max_sessions = n;
        }

        if let Ok(v) = env::var("ADMIN_API_TOKEN") {
            self.admin.api_token = v;
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_mode(value: &str) -> Option<VerificationMode> {
    match value.to_ascii_lowercase().as_str() {
        "verify" => Some(VerificationMode::Verify),
        "sms" => Some(VerificationMode::Sms),
        _ => None,
    }
}
