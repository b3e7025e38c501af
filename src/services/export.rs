use chrono::NaiveDateTime;
use sea_orm::ConnectionTrait;

use crate::entity::prelude::*;
use crate::errors::BotResult;
use crate::services::DebtService;

/// A ready to send spreadsheet with a stable, collision free name.
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct ExportService;

impl ExportService {
    /// Renders every debt the user still keeps on the books, closed ones
    /// included, as a CSV file. `None` when there is nothing to export.
    #[tracing::instrument(skip_all, fields(user_id = user.id))]
    pub async fn export_debts(
        db: &impl ConnectionTrait,
        user: &UserModel,
        now: NaiveDateTime,
    ) -> BotResult<Option<ExportFile>> {
        let debts = DebtService::get_all(db, user.id).await?;

        if debts.is_empty() {
            return Ok(None);
        }

        Ok(Some(build_csv(&debts, user.locale.as_ref(), user.id, now)))
    }
}

pub(crate) fn build_csv(
    debts: &[DebtModel],
    locale: &str,
    user_id: i64,
    now: NaiveDateTime,
) -> ExportFile {
    let headers = [
        t!("export.header-person", locale = locale).to_string(),
        t!("export.header-amount", locale = locale).to_string(),
        t!("export.header-currency", locale = locale).to_string(),
        t!("export.header-direction", locale = locale).to_string(),
        t!("export.header-date", locale = locale).to_string(),
        t!("export.header-due", locale = locale).to_string(),
        t!("export.header-status", locale = locale).to_string(),
        t!("export.header-comment", locale = locale).to_string(),
    ];

    // Excel refuses to guess UTF-8 without the BOM.
    let mut out = String::from("\u{feff}");

    push_row(&mut out, headers.iter().map(String::as_str));

    for debt in debts {
        let direction = if debt.direction.is_owe() {
            t!("export.direction-owe", locale = locale)
        } else {
            t!("export.direction-owed", locale = locale)
        };

        let status = if debt.closed {
            t!("export.status-closed", locale = locale)
        } else {
            t!("export.status-open", locale = locale)
        };

        let fields = [
            debt.person.clone(),
            debt.amount.to_string(),
            debt.currency.code().to_owned(),
            direction.to_string(),
            debt.date.to_string(),
            debt.due.to_string(),
            status.to_string(),
            debt.comment.clone().unwrap_or_default(),
        ];

        push_row(&mut out, fields.iter().map(String::as_str));
    }

    ExportFile {
        filename: format!("debts_{user_id}_{}.csv", now.format("%Y%m%d_%H%M%S")),
        bytes: out.into_bytes(),
    }
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;

    for field in fields {
        if !first {
            out.push(',');
        }

        out.push_str(&quote_field(field));
        first = false;
    }

    out.push_str("\r\n");
}

fn quote_field(field: &str) -> String {
    if field.contains(['"', ',', ';', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::utils::Clock;

    fn debt(person: &str, comment: Option<&str>) -> DebtModel {
        DebtModel {
            id: 1,
            user_id: 7,
            person: person.to_owned(),
            amount: 250_000,
            currency: Currency::Uzs,
            direction: DebtDirection::Owe,
            date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            due: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap(),
            comment: comment.map(ToOwned::to_owned),
            closed: false,
            active: true,
            created_at: Clock::now(),
            updated_at: Clock::now(),
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 10)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap()
    }

    #[test]
    fn filename_carries_user_and_timestamp() {
        let file = build_csv(&[debt("Anvar", None)], "en", 7, stamp());

        assert_eq!(file.filename, "debts_7_20250410_093005.csv");
    }

    #[test]
    fn one_row_per_debt_plus_header() {
        let debts = vec![debt("Anvar", None), debt("Umid", Some("lunch"))];
        let file = build_csv(&debts, "en", 7, stamp());
        let text = String::from_utf8(file.bytes).unwrap();

        assert_eq!(text.lines().count(), 3, "got: {text}");
        assert!(text.starts_with('\u{feff}'), "BOM missing");
        assert!(text.contains("Umid"), "got: {text}");
    }

    #[test]
    fn quoting_protects_separators_and_quotes() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn commas_in_names_stay_in_one_cell() {
        let file = build_csv(&[debt("Anvar, aka", None)], "en", 7, stamp());
        let text = String::from_utf8(file.bytes).unwrap();

        assert!(text.contains("\"Anvar, aka\""), "got: {text}");
    }
}
