/// Default prefix prepended to every endpoint path.
pub const DEFAULT_BASE_URL: &str = "/api";
/// Default number of retries after the initial attempt outside development.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base delay between retries.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default path of the access-token refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Runtime mode the client is configured for.
///
/// Development builds fail fast: no automatic retries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuntimeMode {
    Development,
    Production,
}

impl RuntimeMode {
    /// Detects the mode from `STORYFRAME_ENV` (`development` or `dev`).
    ///
    /// On `wasm32` there is no process environment; the mode is always
    /// [`RuntimeMode::Production`].
    pub fn current() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            match std::env::var("STORYFRAME_ENV") {
                Ok(value) => Self::parse(&value),
                Err(_) => Self::Production,
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            Self::Production
        }
    }

    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("development") || value.eq_ignore_ascii_case("dev") {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Retry count used when none is configured explicitly.
    pub fn default_retry_attempts(self) -> u32 {
        match self {
            Self::Development => 0,
            Self::Production => DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

/// Configures base URL, timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Prefix prepended to every endpoint path.
    ///
    /// Native targets need an absolute URL (`https://host/api`); a relative
    /// prefix only resolves inside a browser.
    pub base_url: String,
    /// Maximum number of retries after the initial attempt.
    pub retry_attempts: u32,
    /// Base retry delay in milliseconds (linear strategy).
    pub retry_delay_ms: u64,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Endpoint called to exchange an expired access token for a new one.
    pub refresh_endpoint: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::for_mode(RuntimeMode::current())
    }
}

impl ClientOptions {
    /// Options with defaults for the given runtime mode.
    pub fn for_mode(mode: RuntimeMode) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            retry_attempts: mode.default_retry_attempts(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            refresh_endpoint: DEFAULT_REFRESH_ENDPOINT.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_refresh_endpoint(mut self, refresh_endpoint: impl Into<String>) -> Self {
        self.refresh_endpoint = refresh_endpoint.into();
        self
    }

    /// Builds options from environment variables.
    ///
    /// Reads:
    /// - `STORYFRAME_API_URL` — base URL (required, e.g. `https://app.example.com/api`)
    /// - `STORYFRAME_ENV` — `development` disables retries by default
    /// - `STORYFRAME_RETRY_ATTEMPTS`, `STORYFRAME_RETRY_DELAY_MS`,
    ///   `STORYFRAME_TIMEOUT_MS` — optional numeric overrides
    ///
    /// **Not available on `wasm32` targets.**
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("STORYFRAME_API_URL")
            .map_err(|_| "missing STORYFRAME_API_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("STORYFRAME_API_URL is set but empty".to_owned());
        }

        let mut options = Self::for_mode(RuntimeMode::current()).with_base_url(base_url.trim());
        if let Some(value) = env_number::<u32>("STORYFRAME_RETRY_ATTEMPTS")? {
            options.retry_attempts = value;
        }
        if let Some(value) = env_number::<u64>("STORYFRAME_RETRY_DELAY_MS")? {
            options.retry_delay_ms = value;
        }
        if let Some(value) = env_number::<u64>("STORYFRAME_TIMEOUT_MS")? {
            options.timeout_ms = value;
        }
        Ok(options)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn env_number<N: std::str::FromStr>(name: &str) -> std::result::Result<Option<N>, String> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|_| format!("{name} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(None),
    }
}
