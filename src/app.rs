use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_openai::config::{OPENAI_API_BASE, OpenAIConfig};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use sea_orm::{DatabaseConnection, DbConn, SqlxPostgresConnector};
use sqlx::postgres::PgConnectOptions;
use teloxide::Bot;
use teloxide::dispatching::dialogue::InMemStorage;

use crate::scheduler::JobRegistry;
use crate::services::rates::{RateService, DEFAULT_RATES_URL};
use crate::services::UserService;
use crate::telegram::forms::FormState;
use crate::user::UserState;

pub struct App {
    bot: Bot,
    db: DatabaseConnection,
    rates: RateService,
    ai: Option<AIConfig>,
    scheduler: JobRegistry,
    form_storage: Arc<InMemStorage<FormState>>,
    admin_ids: Vec<i64>,
    tz: FixedOffset,
}

pub struct AIConfig {
    openai_client: async_openai::Client<OpenAIConfig>,
    model: String,
}

impl AIConfig {
    pub fn openai_client(&self) -> &async_openai::Client<OpenAIConfig> {
        &self.openai_client
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize, Debug)]
struct EnvConfig {
    telegram_bot_token: String,
    database_url: String,

    admin_user_ids: Option<String>,
    timezone_offset: Option<String>,
    rates_url: Option<String>,

    openai_api_key: Option<String>,
    openai_api_base: Option<String>,
    openai_api_model: Option<String>,
}

impl App {
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn rates(&self) -> &RateService {
        &self.rates
    }

    pub fn ai(&self) -> Option<&AIConfig> {
        self.ai.as_ref()
    }

    pub fn scheduler(&self) -> &JobRegistry {
        &self.scheduler
    }

    pub fn form_storage(&self) -> Arc<InMemStorage<FormState>> {
        self.form_storage.clone()
    }

    pub fn admin_ids(&self) -> &[i64] {
        &self.admin_ids
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn tz(&self) -> FixedOffset {
        self.tz
    }

    /// Wall clock in the bot timezone. All user facing times live here.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }
}

async fn init_db(env: &EnvConfig) -> anyhow::Result<DbConn> {
    let database_url = &env.database_url;

    let options = PgConnectOptions::from_str(database_url)?;

    let pool = sqlx::PgPool::connect_with(options)
        .await
        .context("Cannot connect DB")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Cannot migrate")?;

    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}

async fn init_ai(env: &EnvConfig) -> anyhow::Result<Option<AIConfig>> {
    let Some(api_key) = env.openai_api_key.as_deref() else {
        return Ok(None);
    };

    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(env.openai_api_base.as_deref().unwrap_or(OPENAI_API_BASE));

    let http_client = reqwest::ClientBuilder::new()
        .timeout(Duration::from_secs(60))
        .build()?;

    let openai_client =
        async_openai::Client::with_config(openai_config).with_http_client(http_client);

    let config = AIConfig {
        openai_client,
        model: env.openai_api_model.clone().unwrap_or("gpt-4o".into()),
    };

    Ok(Some(config))
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(part, "Skipping unparsable admin id");

                None
            },
        })
        .collect()
}

fn parse_timezone(raw: Option<&str>) -> anyhow::Result<FixedOffset> {
    let raw = raw.unwrap_or("+05:00");

    FixedOffset::from_str(raw).with_context(|| format!("Bad TIMEZONE_OFFSET: {raw}"))
}

impl App {
    pub async fn init() -> anyhow::Result<&'static Self> {
        tracing::trace!("Init application");
        let env: EnvConfig = envy::from_env()?;

        let admin_ids = parse_admin_ids(env.admin_user_ids.as_deref().unwrap_or(""));
        let tz = parse_timezone(env.timezone_offset.as_deref())?;

        let ai = init_ai(&env).await?;

        let bot = Bot::new(&env.telegram_bot_token);

        let db = init_db(&env).await?;

        let rates_client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;

        let rates = RateService::new(
            rates_client,
            env.rates_url.clone().unwrap_or(DEFAULT_RATES_URL.into()),
        );

        // Global static to avoid dragging Arc through every handler
        let app = Box::new(Self {
            bot,
            db,
            rates,
            ai,
            scheduler: JobRegistry::new(tz),
            form_storage: InMemStorage::new(),
            admin_ids,
            tz,
        });

        let app = &*Box::leak(app);

        Ok(app)
    }

    pub async fn user_state(&'static self, user_id: i64) -> anyhow::Result<UserState> {
        let (user, newly_created) = UserService::get_or_create(self.db(), user_id).await?;

        Ok(UserState::new(user, newly_created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_list() {
        assert_eq!(parse_admin_ids("1, 42 ,999"), vec![1, 42, 999]);
        assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("7,junk,8"), vec![7, 8]);
    }

    #[test]
    fn parses_timezone_offset() {
        assert_eq!(
            parse_timezone(Some("+05:00")).unwrap(),
            FixedOffset::east_opt(5 * 3600).unwrap()
        );
        assert_eq!(
            parse_timezone(None).unwrap(),
            FixedOffset::east_opt(5 * 3600).unwrap()
        );
        assert!(parse_timezone(Some("tashkent")).is_err());
    }
}
