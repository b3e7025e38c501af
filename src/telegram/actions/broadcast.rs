use itertools::Itertools as _;
use teloxide::prelude::*;

use crate::app::App;
use crate::delivery::{self, OutgoingMessage};
use crate::telegram::handlers::HandleStatus;
use crate::user::UserState;

const FAILED_IDS_SHOWN: usize = 20;

/// Sizes come sorted ascending, the last one is the original quality.
fn reply_photo(m: &Message) -> Option<String> {
    let photos = m.reply_to_message()?.photo()?;

    photos.last().map(|photo| photo.file.id.clone())
}

fn summarize(report: &delivery::BroadcastReport) -> String {
    let mut summary = format!(
        "Broadcast finished. Sent {sent}, failed {failed}",
        sent = report.sent,
        failed = report.failed,
    );

    if !report.failed_user_ids.is_empty() {
        let shown = report
            .failed_user_ids
            .iter()
            .take(FAILED_IDS_SHOWN)
            .join(", ");

        let hidden = report.failed_user_ids.len().saturating_sub(FAILED_IDS_SHOWN);

        if hidden > 0 {
            summary.push_str(&format!("\nFailed ids: {shown} and {hidden} more"));
        } else {
            summary.push_str(&format!("\nFailed ids: {shown}"));
        }
    }

    summary
}

/// `/broadcast <text>` sends to every active user right away. Replying to
/// a photo attaches it, the text becomes the caption.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
    text: &str,
) -> anyhow::Result<HandleStatus> {
    let photo = reply_photo(m);

    if text.trim().is_empty() && photo.is_none() {
        app.bot()
            .send_message(m.chat.id, "Broadcast needs a text or a photo reply")
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let mut message = OutgoingMessage::text(text.trim());

    if let Some(photo) = photo {
        message = message.with_photo(photo);
    }

    let report = delivery::broadcast(app, &message, Some(m.chat.id)).await?;

    app.bot().send_message(m.chat.id, summarize(&report)).await?;

    Ok(HandleStatus::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::BroadcastReport;

    #[test]
    fn summary_without_failures_stays_short() {
        let report = BroadcastReport {
            sent: 10,
            failed: 0,
            failed_user_ids: vec![],
        };

        assert_eq!(summarize(&report), "Broadcast finished. Sent 10, failed 0");
    }

    #[test]
    fn summary_caps_listed_ids() {
        let report = BroadcastReport {
            sent: 0,
            failed: 25,
            failed_user_ids: (1..=25).collect(),
        };

        let summary = summarize(&report);

        assert!(summary.contains("20"));
        assert!(summary.ends_with("and 5 more"));
    }
}
