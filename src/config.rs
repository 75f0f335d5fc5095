use dotenvy::dotenv;
use log::{error, warn};
use serde::Deserialize;
use std::env;

const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_IMAGE_BUCKET: &str = "listing-images";

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub http_bind_address: Option<String>,
    pub image_bucket: Option<String>,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Option<Vec<String>>,
}

impl Config {
    pub fn bind_address(&self) -> String {
        self.http_bind_address
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    pub fn image_bucket(&self) -> &str {
        self.image_bucket.as_deref().unwrap_or(DEFAULT_IMAGE_BUCKET)
    }

    /// Backend url and service role key, if both are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        let url = non_empty(self.supabase_url.as_deref())?;
        let key = non_empty(self.service_role_key.as_deref())?;
        Some((url, key))
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        non_empty(self.jwt_secret.as_deref())
    }

    fn apply_env_overrides(mut self) -> Config {
        let overrides: [(&str, &mut Option<String>); 4] = [
            ("SUPABASE_URL", &mut self.supabase_url),
            ("SUPABASE_ANON_KEY", &mut self.anon_key),
            ("SUPABASE_SERVICE_ROLE_KEY", &mut self.service_role_key),
            ("SUPABASE_JWT_SECRET", &mut self.jwt_secret),
        ];

        for (name, field) in overrides {
            if let Ok(value) = env::var(name) {
                *field = Some(value);
            }
        }

        if let Ok(origins) = env::var("CORS_ORIGINS") {
            self.cors_origins = Some(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }

        self
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn create_test_config() -> Config {
    Config {
        supabase_url: Some("http://localhost:54321".to_string()),
        anon_key: Some("anon".to_string()),
        service_role_key: Some("service".to_string()),
        jwt_secret: None,
        http_bind_address: None,
        image_bucket: None,
        cors_origins: Some(vec!["http://localhost:3000".to_string()]),
    }
}

pub fn read_config() -> Config {
    dotenv().ok();

    let from_file = match env::var(CONFIG_PATH_ENV) {
        Ok(config_path) => std::fs::read(&config_path)
            .map_err(|e| format!("{config_path}: {e}"))
            .and_then(|bytes| toml::from_slice::<Config>(&bytes).map_err(|e| e.to_string()))
            .unwrap_or_else(|err| {
                error!("failed to read config: {err}");
                std::process::exit(1);
            }),
        Err(_) => {
            warn!("{CONFIG_PATH_ENV} not set, reading configuration from the environment only");
            Config::default()
        }
    };

    let config = from_file.apply_env_overrides();
    if config.admin_credentials().is_none() {
        warn!("SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY missing, backend endpoints will answer 500");
    }
    config
}
