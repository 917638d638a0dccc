use dog_vault::{env_flag, env_var_or, VaultConfig};

/// Process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub vault: VaultConfig,
}

/// Shared-secret header check
#[derive(Clone)]
pub struct AuthConfig {
    pub api_key: String,
    pub required: bool,
}

impl AuthConfig {
    pub fn disabled() -> Self {
        Self {
            api_key: String::new(),
            required: false,
        }
    }

    pub fn require<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            required: true,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"<redacted>")
            .field("required", &self.required)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_var_or("HTTP_HOST", "0.0.0.0".to_string()),
            port: env_var_or("PORT", 3000),
            auth: AuthConfig {
                api_key: env_var_or("API_KEY", "super-secret-key".to_string()),
                required: env_flag("REQUIRE_API_KEY", true),
            },
            vault: VaultConfig::from_env(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
