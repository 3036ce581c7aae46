// ABOUTME: Server configuration sourced from the environment

use std::env;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub database_url: String,
    pub bot_storage_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid number");

        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:botdock.db".to_string());

        let bot_storage_path =
            env::var("BOT_STORAGE_PATH").unwrap_or_else(|_| "/var/lib/bots".to_string());

        Config {
            host,
            port,
            cors_origin,
            database_url,
            bot_storage_path,
        }
    }
}
