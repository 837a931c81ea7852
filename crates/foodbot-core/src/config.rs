use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and an optional `.env` file).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_users: Vec<i64>,

    // Reddit (app-only OAuth)
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub http_timeout: Duration,

    // Files
    pub subreddits_file: PathBuf,
    pub record_store_file: PathBuf,
    pub destinations_file: PathBuf,
    pub log_file: Option<PathBuf>,

    // Selection
    pub initial_batch_size: usize,
    pub max_search_size: usize,
    pub search_result_limit: usize,

    // Delivery loop
    pub poll_interval: Duration,

    // Process supervisor
    pub pm2_path: PathBuf,
    pub pm2_process_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let get_u64 = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());
        let get_usize = |key: &str| get(key).and_then(|s| s.trim().parse::<usize>().ok());

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let reddit_client_id = get("REDDIT_CLIENT_ID").ok_or_else(|| {
            Error::Config("REDDIT_CLIENT_ID environment variable is required".to_string())
        })?;
        let reddit_client_secret = get("REDDIT_CLIENT_SECRET").ok_or_else(|| {
            Error::Config("REDDIT_CLIENT_SECRET environment variable is required".to_string())
        })?;

        let admin_users = parse_csv_i64(get("FOODBOT_ADMIN_USERS"));
        let reddit_user_agent =
            get("REDDIT_USER_AGENT").unwrap_or_else(|| "telegram:foodbot:v0.2".to_string());
        let http_timeout = Duration::from_secs(get_u64("HTTP_TIMEOUT_SECS").unwrap_or(30));

        let subreddits_file =
            PathBuf::from(get("SUBREDDITS_FILE").unwrap_or_else(|| "subreddits.txt".to_string()));
        let record_store_file = PathBuf::from(
            get("RECORD_STORE_FILE").unwrap_or_else(|| "foodbot-records.json".to_string()),
        );
        let destinations_file = PathBuf::from(
            get("DESTINATIONS_FILE").unwrap_or_else(|| "foodbot-destinations.json".to_string()),
        );
        let log_file = get("LOG_FILE").map(PathBuf::from);

        let initial_batch_size = get_usize("INITIAL_BATCH_SIZE").unwrap_or(20).max(1);
        // The cap never sits below the first batch.
        let max_search_size = get_usize("MAX_SEARCH_SIZE")
            .unwrap_or(500)
            .max(initial_batch_size);
        let search_result_limit = get_usize("SEARCH_RESULT_LIMIT").unwrap_or(100).max(1);

        let poll_interval = Duration::from_secs(get_u64("POLL_INTERVAL_SECS").unwrap_or(30).max(1));

        let pm2_path = PathBuf::from(get("PM2_PATH").unwrap_or_else(|| "pm2".to_string()));
        let pm2_process_name = get("PM2_PROCESS_NAME").unwrap_or_else(|| "foodbot".to_string());

        Ok(Self {
            telegram_bot_token,
            admin_users,
            reddit_client_id,
            reddit_client_secret,
            reddit_user_agent,
            http_timeout,
            subreddits_file,
            record_store_file,
            destinations_file,
            log_file,
            initial_batch_size,
            max_search_size,
            search_result_limit,
            poll_interval,
            pm2_path,
            pm2_process_name,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
