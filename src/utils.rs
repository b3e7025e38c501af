use std::time::Duration;

use again::RetryPolicy;
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use lazy_static::lazy_static;
use tokio::sync::broadcast;

use crate::errors::ValidationError;

macro_rules! tick {
    ($period:expr, $code:block) => {
        let __period = $period;
        let mut __interval = ::tokio::time::interval(__period);
        loop {
            ::tokio::select! {
                _ = __interval.tick() => {},
                _ = $crate::utils::ctrl_c() => {
                    ::tracing::debug!("Received terminate signal. Stop processing");
                    break;
                },
            }

            let __start = ::tokio::time::Instant::now();
            $code;
            let __diff = __start.elapsed();

            if (__diff > __period) {
                ::tracing::warn!(
                    diff = (__diff - __period).as_secs_f64(),
                    unit = "s",
                    "Task took a bit more time than allowed"
                );
            }
        }
    };
}

pub(crate) use tick;

/// Short exponential backoff for outbound HTTP. Callers that can serve
/// stale data do so once this gives up.
pub async fn retry<T>(task: T) -> Result<T::Item, T::Error>
where
    T: again::Task,
{
    let policy = RetryPolicy::exponential(Duration::from_millis(100))
        .with_jitter(true)
        .with_max_delay(Duration::from_secs(2))
        .with_max_retries(3);

    policy.retry(task).await
}

lazy_static! {
    static ref KILL: (broadcast::Sender<()>, broadcast::Receiver<()>) = broadcast::channel(1);
}

static mut KILLED: bool = false;

pub async fn listen_for_ctrl_c() {
    tokio::signal::ctrl_c().await.ok();

    KILL.0.send(()).ok();

    unsafe { KILLED = true };
}

pub async fn ctrl_c() {
    if unsafe { KILLED } {
        return;
    }

    KILL.0.subscribe().recv().await.ok();
}

pub struct Clock;

impl Clock {
    pub fn now() -> NaiveDateTime {
        Utc::now().naive_local()
    }
}

/// Parses a wall clock time in "HH:MM" form. Notification times are stored
/// in this format and validated before they ever reach the scheduler.
pub fn parse_time_of_day(value: &str) -> Result<(u32, u32), ValidationError> {
    let malformed = || ValidationError::MalformedTimeOfDay(value.to_owned());

    let (hour, minute) = value.split_once(':').ok_or_else(malformed)?;

    if hour.len() != 2 || minute.len() != 2 {
        return Err(malformed());
    }

    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let minute: u32 = minute.parse().map_err(|_| malformed())?;

    if hour > 23 || minute > 59 {
        return Err(malformed());
    }

    Ok((hour, minute))
}

/// Drops seconds and smaller units so due checks compare whole minutes.
pub fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|now| now.with_nanosecond(0))
        .unwrap_or(now)
}

/// Groups digits by thousands, "1500000" reads terribly in a sum message.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }

        grouped.push(ch);
    }

    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

pub fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%d.%m.%Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_time_of_day("09:30"), Ok((9, 30)));
        assert_eq!(parse_time_of_day("00:00"), Ok((0, 0)));
        assert_eq!(parse_time_of_day("23:59"), Ok((23, 59)));
    }

    #[test]
    fn rejects_malformed_times() {
        for input in ["24:00", "12:60", "9:30", "09:5", "morning", "09-30", ""] {
            assert!(
                parse_time_of_day(input).is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn truncates_seconds() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 16)
            .unwrap()
            .and_hms_opt(9, 30, 42)
            .unwrap();

        let truncated = truncate_to_minute(now);

        assert_eq!(truncated.to_string(), "2025-03-16 09:30:00");
    }

    #[test]
    fn groups_amounts_by_thousands() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_000), "1 000");
        assert_eq!(format_amount(1_500_000), "1 500 000");
        assert_eq!(format_amount(-25_000), "-25 000");
    }
}
