use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::entity::prelude::Currency;
use crate::utils;

/// Where the daily official rates come from. Any endpoint answering with the
/// same JSON shape will do.
pub const DEFAULT_RATES_URL: &str = "https://cbu.uz/uz/arkhiv-kursov-valyut/json/";

const RATES_TTL: Duration = Duration::from_secs(30 * 60);

/// Last resort rates used when the source is unreachable and nothing was
/// fetched yet. Roughly right for mid 2025, close enough for a reminder.
const FALLBACK_USD: f64 = 12_600.0;
const FALLBACK_EUR: f64 = 13_700.0;
const FALLBACK_RUB: f64 = 140.0;

#[derive(Debug, Clone, Deserialize)]
pub struct RateEntry {
    #[serde(rename = "Ccy")]
    pub ccy: String,
    #[serde(rename = "Rate")]
    pub rate: String,
    #[serde(rename = "Date")]
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub date: NaiveDate,
    pub from_fallback: bool,
    usd: f64,
    eur: f64,
    rub: f64,
}

impl RateSnapshot {
    fn fallback() -> Self {
        Self {
            date: Utc::now().date_naive(),
            from_fallback: true,
            usd: FALLBACK_USD,
            eur: FALLBACK_EUR,
            rub: FALLBACK_RUB,
        }
    }

    fn from_entries(entries: &[RateEntry]) -> anyhow::Result<Self> {
        let date = entries
            .iter()
            .find_map(|entry| NaiveDate::parse_from_str(&entry.date, "%d.%m.%Y").ok())
            .unwrap_or_else(|| Utc::now().date_naive());

        Ok(Self {
            date,
            from_fallback: false,
            usd: Self::find(entries, "USD")?,
            eur: Self::find(entries, "EUR")?,
            rub: Self::find(entries, "RUB")?,
        })
    }

    fn find(entries: &[RateEntry], code: &str) -> anyhow::Result<f64> {
        let entry = entries
            .iter()
            .find(|entry| entry.ccy == code)
            .with_context(|| format!("No {code} rate in response"))?;

        entry
            .rate
            .parse()
            .with_context(|| format!("Unparsable {code} rate: {rate}", rate = entry.rate))
    }

    /// How many soums one unit of the given currency is worth.
    pub fn rate_to_uzs(&self, currency: &Currency) -> f64 {
        match currency {
            Currency::Uzs => 1.0,
            Currency::Usd => self.usd,
            Currency::Eur => self.eur,
            Currency::Rub => self.rub,
        }
    }

    pub fn convert_to_uzs(&self, amount: i64, currency: &Currency) -> f64 {
        amount as f64 * self.rate_to_uzs(currency)
    }

    pub fn listed(&self) -> [(Currency, f64); 3] {
        [
            (Currency::Usd, self.usd),
            (Currency::Eur, self.eur),
            (Currency::Rub, self.rub),
        ]
    }

    pub fn to_html(&self, locale: &str) -> String {
        let mut lines = vec![t!("rates.title", locale = locale).to_string()];

        for (currency, rate) in self.listed() {
            lines.push(
                t!(
                    "rates.line",
                    locale = locale,
                    currency = currency.code(),
                    rate = format!("{rate:.2}"),
                )
                .to_string(),
            );
        }

        lines.push(
            t!(
                "rates.updated",
                locale = locale,
                date = utils::format_date(self.date),
            )
            .to_string(),
        );

        if self.from_fallback {
            lines.push(t!("rates.fallback-note", locale = locale).to_string());
        }

        lines.join("\n")
    }
}

struct CachedRates {
    fetched: Instant,
    snapshot: RateSnapshot,
}

pub struct RateService {
    client: reqwest::Client,
    url: String,
    cache: RwLock<Option<CachedRates>>,
}

impl RateService {
    #[must_use]
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self {
            client,
            url,
            cache: RwLock::new(None),
        }
    }

    /// Current rates, from cache when fresh enough. When the source cannot
    /// be reached the last fetched snapshot is served however stale it is,
    /// and the built in table only when there never was one.
    pub async fn snapshot(&self) -> RateSnapshot {
        {
            let cache = self.cache.read().await;

            if let Some(cached) = cache.as_ref() {
                if cached.fetched.elapsed() < RATES_TTL {
                    return cached.snapshot.clone();
                }
            }
        }

        match utils::retry(|| self.fetch()).await {
            Ok(snapshot) => {
                *self.cache.write().await = Some(CachedRates {
                    fetched: Instant::now(),
                    snapshot: snapshot.clone(),
                });

                snapshot
            },
            Err(err) => {
                tracing::warn!(err = ?err, "Rate fetch failed, serving what we have");

                let cache = self.cache.read().await;

                match cache.as_ref() {
                    Some(cached) => cached.snapshot.clone(),
                    None => RateSnapshot::fallback(),
                }
            },
        }
    }

    async fn fetch(&self) -> anyhow::Result<RateSnapshot> {
        let res_text = self
            .client
            .get(self.url.as_str())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let entries = serde_json::from_str::<Vec<RateEntry>>(&res_text)
            .with_context(|| format!("Failed parsing json response:\n{res_text}"))?;

        RateSnapshot::from_entries(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 69, "Code": "840", "Ccy": "USD", "Rate": "12650.32", "Date": "10.04.2025"},
        {"id": 21, "Code": "978", "Ccy": "EUR", "Rate": "13721.15", "Date": "10.04.2025"},
        {"id": 57, "Code": "643", "Ccy": "RUB", "Rate": "146.80", "Date": "10.04.2025"}
    ]"#;

    fn sample_snapshot() -> RateSnapshot {
        let entries: Vec<RateEntry> = serde_json::from_str(SAMPLE).unwrap();

        RateSnapshot::from_entries(&entries).unwrap()
    }

    #[test]
    fn parses_source_response() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.rate_to_uzs(&Currency::Usd), 12650.32);
        assert_eq!(snapshot.rate_to_uzs(&Currency::Rub), 146.80);
        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        assert!(!snapshot.from_fallback);
    }

    #[test]
    fn missing_currency_is_an_error() {
        let entries: Vec<RateEntry> = serde_json::from_str(
            r#"[{"Ccy": "USD", "Rate": "12650.32", "Date": "10.04.2025"}]"#,
        )
        .unwrap();

        let err = RateSnapshot::from_entries(&entries).unwrap_err();

        assert!(err.to_string().contains("EUR"), "got: {err}");
    }

    #[test]
    fn converts_into_soums() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.convert_to_uzs(100, &Currency::Usd), 1_265_032.0);
        assert_eq!(snapshot.convert_to_uzs(500, &Currency::Uzs), 500.0);
    }

    #[test]
    fn fallback_is_marked() {
        let snapshot = RateSnapshot::fallback();

        assert!(snapshot.from_fallback);
        assert!(snapshot.rate_to_uzs(&Currency::Usd) > 0.0);
    }

    #[test]
    fn html_lists_every_currency() {
        let rendered = sample_snapshot().to_html("en");

        assert!(rendered.contains("USD"), "got: {rendered}");
        assert!(rendered.contains("12650.32"), "got: {rendered}");
        assert!(rendered.contains("146.80"), "got: {rendered}");
    }
}
