use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Timelike};
use itertools::Itertools;
use teloxide::utils::html;

use crate::app::App;
use crate::delivery::{self, OutgoingMessage};
use crate::entity::prelude::*;
use crate::scheduler::JobSchedule;
use crate::services::{
    DebtService,
    NotificationService,
    ReminderService,
    ScheduledMessageService,
    UserService,
};
use crate::utils;

pub const DEBT_JOB_PREFIX: &str = "debt_reminder:";
pub const RATE_JOB_PREFIX: &str = "rate_alert:";
pub const SWEEP_JOB_PREFIX: &str = "sweep:";

pub const ONE_OFF_REMINDERS_JOB: &str = "sweep:reminders_once";
pub const REPEATING_REMINDERS_JOB: &str = "sweep:reminders_repeat";
pub const DEBTS_DUE_JOB: &str = "sweep:debts_due";

const REMINDER_SWEEP_PERIOD: Duration = Duration::from_secs(60);
const DEBT_SWEEP_PERIOD: Duration = Duration::from_secs(3600);
const SCHEDULED_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub fn debt_job_id(user_id: i64) -> String {
    format!("{DEBT_JOB_PREFIX}{user_id}")
}

pub fn rate_job_id(user_id: i64) -> String {
    format!("{RATE_JOB_PREFIX}{user_id}")
}

/// Drops every known job and registers them again from the current state of
/// the user table. Runs at startup and whenever an admin asks for it. If the
/// user list cannot be loaded nothing is registered and admins get pinged,
/// a half built schedule is worse than a stale one.
pub async fn rebuild(app: &'static App) -> anyhow::Result<()> {
    let registry = app.scheduler();

    registry.remove_by_prefix(DEBT_JOB_PREFIX).await;
    registry.remove_by_prefix(RATE_JOB_PREFIX).await;
    registry.remove_by_prefix(SWEEP_JOB_PREFIX).await;

    let users = match UserService::get_active(app.db()).await {
        Ok(users) => users,
        Err(err) => {
            let err = anyhow::Error::new(err).context("listing active users for rebuild");

            NotificationService::notify_rebuild_failed(app, &err).await;

            return Err(err);
        },
    };

    for user in &users {
        sync_user_jobs(app, user).await;
    }

    registry
        .register(
            ONE_OFF_REMINDERS_JOB,
            JobSchedule::every(REMINDER_SWEEP_PERIOD),
            move || sweep_one_off_reminders(app),
        )
        .await;

    registry
        .register(
            REPEATING_REMINDERS_JOB,
            JobSchedule::every(REMINDER_SWEEP_PERIOD),
            move || sweep_repeating_reminders(app),
        )
        .await;

    registry
        .register(
            DEBTS_DUE_JOB,
            JobSchedule::every(DEBT_SWEEP_PERIOD),
            move || sweep_debts_due(app),
        )
        .await;

    let jobs = registry.count().await;
    tracing::info!(users = users.len(), jobs, "Scheduler rebuilt");

    Ok(())
}

/// Brings one user's personal jobs in line with their stored notify times.
/// A cleared or unusable time means the job is dropped.
pub async fn sync_user_jobs(app: &'static App, user: &UserModel) {
    let registry = app.scheduler();
    let user_id = user.id;

    match parse_schedule(user.debt_notify_time.as_deref()) {
        Ok(Some(schedule)) => {
            registry
                .register(&debt_job_id(user_id), schedule, move || {
                    send_debt_report(app, user_id)
                })
                .await;
        },
        Ok(None) => {
            registry.remove(&debt_job_id(user_id)).await;
        },
        Err(err) => {
            tracing::warn!(user_id, err = %err, "Unusable debt notify time, dropping the job");

            registry.remove(&debt_job_id(user_id)).await;
        },
    }

    match parse_schedule(user.rate_alert_time.as_deref()) {
        Ok(Some(schedule)) => {
            registry
                .register(&rate_job_id(user_id), schedule, move || {
                    send_rate_alert(app, user_id)
                })
                .await;
        },
        Ok(None) => {
            registry.remove(&rate_job_id(user_id)).await;
        },
        Err(err) => {
            tracing::warn!(user_id, err = %err, "Unusable rate alert time, dropping the job");

            registry.remove(&rate_job_id(user_id)).await;
        },
    }
}

fn parse_schedule(time: Option<&str>) -> anyhow::Result<Option<JobSchedule>> {
    let Some(time) = time else {
        return Ok(None);
    };

    let (hour, minute) = utils::parse_time_of_day(time)?;

    Ok(Some(JobSchedule::daily_at(hour, minute)?))
}

#[tracing::instrument(skip_all, fields(user_id))]
async fn send_debt_report(app: &'static App, user_id: i64) -> anyhow::Result<()> {
    let Some(user) = UserService::query(Some(user_id), Some(true))
        .one(app.db())
        .await?
    else {
        return Ok(());
    };

    let today = app.today();
    let debts = DebtService::due_on_or_before(app.db(), Some(user_id), today).await?;

    if debts.is_empty() {
        return Ok(());
    }

    let message = OutgoingMessage::text(render_debt_report(&debts, user.locale.as_ref(), today));

    deliver(app, user_id, &message).await
}

#[tracing::instrument(skip_all, fields(user_id))]
async fn send_rate_alert(app: &'static App, user_id: i64) -> anyhow::Result<()> {
    let Some(user) = UserService::query(Some(user_id), Some(true))
        .one(app.db())
        .await?
    else {
        return Ok(());
    };

    let snapshot = app.rates().snapshot().await;
    let message = OutgoingMessage::text(snapshot.to_html(user.locale.as_ref()));

    deliver(app, user_id, &message).await
}

/// Send wrapper for the per user jobs. A permanent failure has already
/// deactivated the user, only transient problems bubble up to the job log.
async fn deliver(
    app: &'static App,
    user_id: i64,
    message: &OutgoingMessage,
) -> anyhow::Result<()> {
    match delivery::send_to_user(app, user_id, message).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_permanent() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// One-off reminders are fired once and switched off, whether the send
/// worked or the user turned out to be unreachable. A transient failure
/// leaves the row untouched for the next sweep.
#[tracing::instrument(skip_all)]
async fn sweep_one_off_reminders(app: &'static App) -> anyhow::Result<()> {
    let now = utils::truncate_to_minute(app.now_local());
    let due = ReminderService::due_one_off(app.db(), now).await?;

    if due.is_empty() {
        return Ok(());
    }

    let users = active_users_by_id(app).await?;

    for reminder in due {
        let Some(user) = users.get(&reminder.user_id) else {
            continue;
        };

        let message = OutgoingMessage::text(render_reminder(&reminder, user.locale.as_ref()));

        match delivery::send_to_user(app, user.id, &message).await {
            Ok(()) => {
                ReminderService::deactivate(app.db(), reminder.id).await?;
            },
            Err(err) if err.is_permanent() => {
                ReminderService::deactivate(app.db(), reminder.id).await?;
            },
            Err(err) => {
                tracing::warn!(
                    reminder_id = reminder.id,
                    err = %err,
                    "Reminder send failed, will retry next sweep"
                );
            },
        }
    }

    Ok(())
}

/// Repeating reminders move to their next slot after firing. If several
/// slots were missed while the bot was down only one message goes out.
#[tracing::instrument(skip_all)]
async fn sweep_repeating_reminders(app: &'static App) -> anyhow::Result<()> {
    let now = utils::truncate_to_minute(app.now_local());
    let due = ReminderService::due_repeating(app.db(), now).await?;

    if due.is_empty() {
        return Ok(());
    }

    let users = active_users_by_id(app).await?;

    for reminder in due {
        let Some(user) = users.get(&reminder.user_id) else {
            continue;
        };

        let message = OutgoingMessage::text(render_reminder(&reminder, user.locale.as_ref()));
        let sent = delivery::send_to_user(app, user.id, &message).await;

        match sent {
            Ok(()) => {},
            Err(err) if err.is_permanent() => {},
            Err(err) => {
                tracing::warn!(
                    reminder_id = reminder.id,
                    err = %err,
                    "Reminder send failed, will retry next sweep"
                );

                continue;
            },
        }

        match reminder.repeat.advance_past(reminder.due, now) {
            Some(next) => {
                ReminderService::reschedule(app.db(), reminder.id, next).await?;
            },
            None => {
                tracing::warn!(reminder_id = reminder.id, "Repeating reminder has no next slot");

                ReminderService::deactivate(app.db(), reminder.id).await?;
            },
        }
    }

    Ok(())
}

/// Safety net behind the per user debt jobs. Looks for users whose personal
/// job is missing from the registry while their notify hour is happening
/// right now, so nobody already served by a live job hears this twice.
#[tracing::instrument(skip_all)]
async fn sweep_debts_due(app: &'static App) -> anyhow::Result<()> {
    let now = app.now_local();
    let today = app.today();
    let Some(tomorrow) = today.succ_opt() else {
        return Ok(());
    };

    let users = UserService::get_active(app.db()).await?;
    let mut targets = Vec::new();

    for user in users {
        let Some(time) = user.debt_notify_time.as_deref() else {
            continue;
        };

        let Ok((hour, _)) = utils::parse_time_of_day(time) else {
            continue;
        };

        if hour != now.hour() {
            continue;
        }

        if app.scheduler().contains(&debt_job_id(user.id)).await {
            continue;
        }

        targets.push(user);
    }

    if targets.is_empty() {
        return Ok(());
    }

    let debts = DebtService::due_on(app.db(), &[today, tomorrow]).await?;
    let mut by_user: HashMap<i64, Vec<DebtModel>> = debts
        .into_iter()
        .map(|debt| (debt.user_id, debt))
        .into_group_map();

    for user in targets {
        let Some(debts) = by_user.remove(&user.id) else {
            continue;
        };

        let message = OutgoingMessage::text(render_debt_report(&debts, user.locale.as_ref(), today));

        match delivery::send_to_user(app, user.id, &message).await {
            Ok(()) => {},
            Err(err) if err.is_permanent() => {},
            Err(err) => {
                tracing::warn!(user_id = user.id, err = %err, "Debt sweep send failed");
            },
        }
    }

    Ok(())
}

/// Delivery loop for admin scheduled broadcasts. Not part of the rebuilt
/// registry, it runs for the whole life of the process.
pub async fn scheduled_messages_worker(app: &'static App) {
    utils::tick!(SCHEDULED_SWEEP_PERIOD, {
        if let Err(err) = sweep_scheduled_messages(app).await {
            tracing::error!(err = ?err, "Scheduled message sweep failed");
        }
    });
}

async fn sweep_scheduled_messages(app: &'static App) -> anyhow::Result<()> {
    let now = utils::truncate_to_minute(app.now_local());
    let pending = ScheduledMessageService::pending(app.db(), now).await?;

    if pending.is_empty() {
        return Ok(());
    }

    let users = active_users_by_id(app).await?;

    for scheduled in pending {
        if !users.contains_key(&scheduled.user_id) {
            continue;
        }

        let mut message = OutgoingMessage::text(scheduled.text.clone());

        if let Some(photo) = &scheduled.photo {
            message = message.with_photo(photo.clone());
        }

        match delivery::send_to_user(app, scheduled.user_id, &message).await {
            Ok(()) => {
                ScheduledMessageService::mark_sent(app.db(), scheduled.id).await?;
            },
            Err(err) if err.is_permanent() => {
                ScheduledMessageService::deactivate_for_user(app.db(), scheduled.user_id).await?;
            },
            Err(err) => {
                tracing::warn!(
                    message_id = scheduled.id,
                    err = %err,
                    "Scheduled message send failed, will retry next sweep"
                );
            },
        }
    }

    Ok(())
}

async fn active_users_by_id(app: &App) -> anyhow::Result<HashMap<i64, UserModel>> {
    let users = UserService::get_active(app.db()).await?;

    Ok(users.into_iter().map(|user| (user.id, user)).collect())
}

pub(crate) fn render_debt_report(debts: &[DebtModel], locale: &str, today: NaiveDate) -> String {
    let mut lines = vec![t!("debt-report.title", locale = locale).to_string()];

    for debt in debts {
        let person = html::escape(&debt.person);
        let amount = utils::format_amount(debt.amount);
        let due = utils::format_date(debt.due);

        let line = if debt.direction.is_owe() {
            t!(
                "debt-report.owe-line",
                locale = locale,
                person = person,
                amount = amount,
                currency = debt.currency.code(),
                due = due,
            )
        } else {
            t!(
                "debt-report.owed-line",
                locale = locale,
                person = person,
                amount = amount,
                currency = debt.currency.code(),
                due = due,
            )
        };

        if debt.is_overdue(today) {
            lines.push(format!("❗️ {line}"));
        } else {
            lines.push(line.to_string());
        }
    }

    lines.join("\n")
}

fn render_reminder(reminder: &ReminderModel, locale: &str) -> String {
    t!(
        "reminder.fired",
        locale = locale,
        text = html::escape(&reminder.text)
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::utils::Clock;

    fn debt(person: &str, amount: i64, direction: DebtDirection, due: NaiveDate) -> DebtModel {
        DebtModel {
            id: 1,
            user_id: 1,
            person: person.to_owned(),
            amount,
            currency: Currency::Uzs,
            direction,
            date: due,
            due,
            comment: None,
            closed: false,
            active: true,
            created_at: Clock::now(),
            updated_at: Clock::now(),
        }
    }

    #[test]
    fn report_shows_person_and_grouped_amount() {
        let due = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let debts = vec![debt("Anvar", 1_500_000, DebtDirection::Owe, due)];

        let report = render_debt_report(&debts, "en", due);

        assert!(report.contains("Anvar"), "got: {report}");
        assert!(report.contains("1 500 000"), "got: {report}");
        assert!(!report.contains("❗️"), "due today is not overdue: {report}");
    }

    #[test]
    fn report_marks_overdue_rows() {
        let due = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 4, 12).unwrap();
        let debts = vec![debt("Anvar", 50_000, DebtDirection::Owed, due)];

        let report = render_debt_report(&debts, "en", today);

        assert!(report.contains("❗️"), "got: {report}");
    }

    #[test]
    fn report_escapes_html_in_names() {
        let due = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let debts = vec![debt("<b>Anvar</b>", 1_000, DebtDirection::Owe, due)];

        let report = render_debt_report(&debts, "en", due);

        assert!(!report.contains("<b>Anvar"), "got: {report}");
        assert!(report.contains("&lt;b&gt;Anvar"), "got: {report}");
    }

    #[test]
    fn job_ids_are_stable_per_user() {
        assert_eq!(debt_job_id(42), "debt_reminder:42");
        assert_eq!(rate_job_id(42), "rate_alert:42");
        assert!(debt_job_id(42).starts_with(DEBT_JOB_PREFIX));
    }

    #[test]
    fn cleared_notify_time_means_no_schedule() {
        assert!(parse_schedule(None).unwrap().is_none());
        assert!(parse_schedule(Some("09:00")).unwrap().is_some());
        assert!(parse_schedule(Some("9 am")).is_err());
    }
}
