use std::{collections::HashMap, fs};

use transport::JoinOptions;

#[derive(Debug, Clone)]
pub struct Settings {
    pub channel: String,
    pub app_id: String,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: "main".into(),
            app_id: "dev-app".into(),
            token: None,
        }
    }
}

impl Settings {
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            channel: self.channel.clone(),
            app_id: self.app_id.clone(),
            token: self.token.clone(),
        }
    }
}

/// The core treats channel/app id/token as opaque values; they are only
/// loaded here and passed through.
pub fn load_settings(path: &str) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("channel") {
                settings.channel = v.clone();
            }
            if let Some(v) = file_cfg.get("app_id") {
                settings.app_id = v.clone();
            }
            if let Some(v) = file_cfg.get("token") {
                settings.token = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("APP__CHANNEL") {
        settings.channel = v;
    }
    if let Ok(v) = std::env::var("APP__APP_ID") {
        settings.app_id = v;
    }
    if let Ok(v) = std::env::var("APP__TOKEN") {
        settings.token = Some(v);
    }

    settings
}
