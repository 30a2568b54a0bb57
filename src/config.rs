use crate::domain::{AccountName, Decimal, DisplayMode, TemplateId};
use crate::engine::MAX_GROUP_SIZE;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_mode: BotMode,
    pub operator_account: AccountName,
    pub minting_account: AccountName,
    pub pack_template_ids: Vec<TemplateId>,
    pub active_category: String,
    pub open_memo: String,
    pub indexer_api_url: String,
    pub chain_api_url: String,
    pub signer_command: String,
    pub rate_limit: Duration,
    pub match_delay: Duration,
    pub return_delay: Duration,
    pub mint_wait: Duration,
    /// Allowance for the local clock running ahead of block time when
    /// deciding whether an active was minted for the current cycle.
    pub mint_clock_skew: Duration,
    pub max_poll_attempts: u32,
    pub group_size: usize,
    pub return_retry_attempts: u32,
    pub display_mode: DisplayMode,
    pub database_path: Option<String>,
    pub tracked_assets_file: PathBuf,
    pub buy_target: Option<BuyTarget>,
    pub balance_refresh: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMode {
    PackOpener,
    Undercut,
    Buyer,
}

/// What the buyer bot is after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyTarget {
    pub template_id: TemplateId,
    pub max_price: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_PACK_TEMPLATES: &str = "350147,408663,896504";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let bot_mode = match env_map
            .get("BOT_MODE")
            .map(|s| s.as_str())
            .unwrap_or("pack-opener")
        {
            "pack-opener" => BotMode::PackOpener,
            "undercut" => BotMode::Undercut,
            "buyer" => BotMode::Buyer,
            other => {
                return Err(ConfigError::InvalidValue(
                    "BOT_MODE".to_string(),
                    format!("must be pack-opener, undercut, or buyer, got {}", other),
                ))
            }
        };

        let operator_account = env_map
            .get("OPERATOR_ACCOUNT")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(AccountName::new)
            .ok_or_else(|| ConfigError::MissingEnv("OPERATOR_ACCOUNT".to_string()))?;

        let minting_account = AccountName::new(string_or(&env_map, "MINTING_ACCOUNT", "battleminers"));

        let pack_template_ids: Vec<TemplateId> = string_or(&env_map, "PACK_TEMPLATE_IDS", DEFAULT_PACK_TEMPLATES)
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(TemplateId::new)
            .collect();
        if pack_template_ids.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PACK_TEMPLATE_IDS".to_string(),
                "must list at least one template id".to_string(),
            ));
        }

        let display_mode = match env_map
            .get("DISPLAY_MODE")
            .map(|s| s.as_str())
            .unwrap_or("count")
        {
            "silent" => DisplayMode::Silent,
            "count" => DisplayMode::Count,
            "full" => DisplayMode::Full,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DISPLAY_MODE".to_string(),
                    format!("must be silent, count, or full, got {}", other),
                ))
            }
        };

        let max_poll_attempts: u32 = parse_or(&env_map, "MAX_POLL_ATTEMPTS", 20)?;
        if max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_POLL_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let group_size: usize = parse_or(&env_map, "GROUP_SIZE", MAX_GROUP_SIZE)?;
        if !(1..=MAX_GROUP_SIZE).contains(&group_size) {
            return Err(ConfigError::InvalidValue(
                "GROUP_SIZE".to_string(),
                format!("must be between 1 and {}", MAX_GROUP_SIZE),
            ));
        }

        let database_path = env_map
            .get("DATABASE_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let buy_target = parse_buy_target(&env_map)?;
        if bot_mode == BotMode::Buyer && buy_target.is_none() {
            return Err(ConfigError::MissingEnv("BUY_TEMPLATE_ID".to_string()));
        }

        Ok(Config {
            bot_mode,
            operator_account,
            minting_account,
            pack_template_ids,
            active_category: string_or(&env_map, "ACTIVE_CATEGORY", "active"),
            open_memo: string_or(&env_map, "OPEN_MEMO", "pack_opening"),
            indexer_api_url: string_or(&env_map, "INDEXER_API_URL", "https://wax.api.atomicassets.io"),
            chain_api_url: string_or(&env_map, "CHAIN_API_URL", "https://api.waxsweden.org"),
            signer_command: string_or(&env_map, "SIGNER_COMMAND", "node --no-warnings transfer.js"),
            rate_limit: millis_or(&env_map, "RATE_LIMIT_MS", 2_000)?,
            match_delay: millis_or(&env_map, "MATCH_DELAY_MS", 100)?,
            return_delay: millis_or(&env_map, "RETURN_DELAY_MS", 500)?,
            mint_wait: millis_or(&env_map, "MINT_WAIT_MS", 6_000)?,
            mint_clock_skew: millis_or(&env_map, "MINT_CLOCK_SKEW_MS", 2_000)?,
            max_poll_attempts,
            group_size,
            return_retry_attempts: parse_or(&env_map, "RETURN_RETRY_ATTEMPTS", 0)?,
            display_mode,
            database_path,
            tracked_assets_file: PathBuf::from(string_or(
                &env_map,
                "TRACKED_ASSETS_FILE",
                "tracked_assets.json",
            )),
            buy_target,
            balance_refresh: millis_or(&env_map, "BALANCE_REFRESH_MS", 60_000)?,
        })
    }
}

fn string_or(env_map: &HashMap<String, String>, key: &str, default: &str) -> String {
    env_map
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("cannot parse {:?}", raw))
        }),
        None => Ok(default),
    }
}

fn millis_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    parse_or(env_map, key, default_ms).map(Duration::from_millis)
}

fn parse_buy_target(env_map: &HashMap<String, String>) -> Result<Option<BuyTarget>, ConfigError> {
    let template_id = match env_map.get("BUY_TEMPLATE_ID").map(|s| s.trim()) {
        Some(id) if !id.is_empty() => TemplateId::new(id),
        _ => return Ok(None),
    };

    let raw_price = env_map
        .get("BUY_TARGET_PRICE")
        .ok_or_else(|| ConfigError::MissingEnv("BUY_TARGET_PRICE".to_string()))?;
    let max_price = Decimal::from_str(raw_price.trim()).map_err(|_| {
        ConfigError::InvalidValue(
            "BUY_TARGET_PRICE".to_string(),
            "must be a decimal WAX amount".to_string(),
        )
    })?;
    if !max_price.is_positive() {
        return Err(ConfigError::InvalidValue(
            "BUY_TARGET_PRICE".to_string(),
            "must be positive".to_string(),
        ));
    }

    Ok(Some(BuyTarget {
        template_id,
        max_price,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("OPERATOR_ACCOUNT".to_string(), "lean4lan.gm".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.bot_mode, BotMode::PackOpener);
        assert_eq!(config.minting_account.as_str(), "battleminers");
        assert_eq!(config.pack_template_ids.len(), 3);
        assert_eq!(config.open_memo, "pack_opening");
        assert_eq!(config.rate_limit, Duration::from_secs(2));
        assert_eq!(config.mint_wait, Duration::from_secs(6));
        assert_eq!(config.mint_clock_skew, Duration::from_secs(2));
        assert_eq!(config.max_poll_attempts, 20);
        assert_eq!(config.group_size, 50);
        assert_eq!(config.return_retry_attempts, 0);
        assert_eq!(config.display_mode, DisplayMode::Count);
        assert!(config.database_path.is_none());
        assert!(config.buy_target.is_none());
    }

    #[test]
    fn test_missing_operator_account() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "OPERATOR_ACCOUNT"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_template_list_is_trimmed() {
        let mut env_map = setup_required_env();
        env_map.insert("PACK_TEMPLATE_IDS".to_string(), " 1, 2 ,,3 ".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        let ids: Vec<_> = config.pack_template_ids.iter().map(|t| t.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_invalid_bot_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("BOT_MODE".to_string(), "sniper".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BOT_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_group_size_bounds() {
        for bad in ["0", "51", "x"] {
            let mut env_map = setup_required_env();
            env_map.insert("GROUP_SIZE".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "GROUP_SIZE"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }

    #[test]
    fn test_zero_poll_attempts_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("MAX_POLL_ATTEMPTS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_POLL_ATTEMPTS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_display_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("DISPLAY_MODE".to_string(), "loud".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DISPLAY_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_buyer_mode_requires_target() {
        let mut env_map = setup_required_env();
        env_map.insert("BOT_MODE".to_string(), "buyer".to_string());
        match Config::from_env_map(env_map.clone()) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "BUY_TEMPLATE_ID"),
            _ => panic!("Expected MissingEnv error"),
        }

        env_map.insert("BUY_TEMPLATE_ID".to_string(), "408663".to_string());
        match Config::from_env_map(env_map.clone()) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "BUY_TARGET_PRICE"),
            _ => panic!("Expected MissingEnv error"),
        }

        env_map.insert("BUY_TARGET_PRICE".to_string(), "12.5".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        let target = config.buy_target.unwrap();
        assert_eq!(target.template_id.as_str(), "408663");
        assert_eq!(target.max_price.to_canonical_string(), "12.5");
    }

    #[test]
    fn test_invalid_delay() {
        let mut env_map = setup_required_env();
        env_map.insert("RATE_LIMIT_MS".to_string(), "-5".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RATE_LIMIT_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
