use anyhow::Context;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolArgs,
    ChatCompletionToolType,
    CreateChatCompletionRequestArgs,
    FunctionObjectArgs,
};
use chrono::{Days, NaiveDate};
use indoc::formatdoc;
use serde_json::json;

use crate::app::AIConfig;
use crate::entity::prelude::{Currency, DebtDirection};
use crate::errors::ValidationError;
use crate::services::DebtDraft;

/// What the model hands back. Everything is optional on purpose, the
/// validation below decides what is usable.
#[derive(Debug, Clone, Deserialize)]
pub struct DebtCandidate {
    pub understood: bool,
    pub direction: Option<String>,
    pub person: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub due: Option<String>,
    pub comment: Option<String>,
}

pub enum ParseOutcome {
    Draft(DebtDraft),
    Unparsable,
}

pub struct DebtParserService;

impl DebtParserService {
    /// Turns a free text message into a debt draft, or admits defeat. The
    /// model only ever proposes, every field is re-checked here before
    /// anything reaches the database.
    #[tracing::instrument(skip_all)]
    pub async fn parse(
        ai: &AIConfig,
        text: &str,
        today: NaiveDate,
    ) -> anyhow::Result<ParseOutcome> {
        let system_prompt = formatdoc!(
            "
                You extract personal debt records from short chat messages written
                in Uzbek, Russian or English.

                Rules:
                1. direction is \"owe\" when the author owes money, \"owed\" when money is owed to the author
                2. currency is one of UZS, USD, EUR, RUB; use UZS when the message does not name one
                3. amount is a whole number of currency units, never negative
                4. due is an ISO date YYYY-MM-DD; resolve relative dates against today, {today}; null when the message names none
                5. set understood to false when the message is not about a debt at all
            "
        );

        let req = CreateChatCompletionRequestArgs::default()
            .model(ai.model())
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt.as_str())
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(text)
                    .build()?
                    .into(),
            ])
            .tools(vec![ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(
                    FunctionObjectArgs::default()
                        .name("record_debt")
                        .description("Record one personal debt extracted from the message")
                        .strict(true)
                        .parameters(json!({
                            "type": "object",
                            "properties": {
                                "understood": {
                                    "type": "boolean",
                                    "description": "False when the message is not about a debt"
                                },
                                "direction": {"type": ["string", "null"]},
                                "person": {"type": ["string", "null"]},
                                "amount": {"type": ["integer", "null"]},
                                "currency": {"type": ["string", "null"]},
                                "due": {"type": ["string", "null"]},
                                "comment": {"type": ["string", "null"]}
                            },
                            "additionalProperties": false,
                            "required": [
                                "understood",
                                "direction",
                                "person",
                                "amount",
                                "currency",
                                "due",
                                "comment"
                            ]
                        }))
                        .build()?,
                )
                .build()?])
            .tool_choice("record_debt")
            .build()?;

        let tool_call = ai
            .openai_client()
            .chat()
            .create(req)
            .await?
            .choices
            .first()
            .context("No choices returned from OpenAI API")?
            .message
            .clone()
            .tool_calls
            .context("No tool calls found in response message")?
            .first()
            .cloned()
            .context("No tool call found in response")?;

        if tool_call.function.name != "record_debt" {
            anyhow::bail!("Wrong function is called");
        }

        let candidate: DebtCandidate = serde_json::from_str(&tool_call.function.arguments)?;

        Ok(outcome(candidate, today))
    }
}

pub(crate) fn outcome(candidate: DebtCandidate, today: NaiveDate) -> ParseOutcome {
    if !candidate.understood {
        return ParseOutcome::Unparsable;
    }

    match validate(&candidate, today) {
        Ok(draft) => ParseOutcome::Draft(draft),
        Err(err) => {
            tracing::debug!(err = %err, "Debt candidate rejected");

            ParseOutcome::Unparsable
        },
    }
}

pub(crate) fn validate(
    candidate: &DebtCandidate,
    today: NaiveDate,
) -> Result<DebtDraft, ValidationError> {
    let person = candidate.person.as_deref().unwrap_or("").trim();

    if person.is_empty() {
        return Err(ValidationError::EmptyPerson);
    }

    let direction_raw = candidate.direction.as_deref().unwrap_or("");
    let direction = DebtDirection::from_keyword(direction_raw)
        .ok_or_else(|| ValidationError::UnknownDirection(direction_raw.to_owned()))?;

    let currency_raw = candidate.currency.as_deref().unwrap_or(Currency::Uzs.code());
    let currency = Currency::from_code(currency_raw)
        .ok_or_else(|| ValidationError::UnknownCurrency(currency_raw.to_owned()))?;

    let amount = candidate.amount.unwrap_or(0);

    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }

    let due = match candidate.due.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| ValidationError::MalformedDate(raw.to_owned()))?,
        None => today.checked_add_days(Days::new(7)).unwrap_or(today),
    };

    Ok(DebtDraft {
        person: person.to_owned(),
        amount,
        currency,
        direction,
        date: today,
        due,
        comment: candidate
            .comment
            .clone()
            .filter(|comment| !comment.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()
    }

    fn candidate() -> DebtCandidate {
        DebtCandidate {
            understood: true,
            direction: Some("owe".to_owned()),
            person: Some(" Anvar ".to_owned()),
            amount: Some(250_000),
            currency: Some("UZS".to_owned()),
            due: Some("2025-04-20".to_owned()),
            comment: Some("lunch".to_owned()),
        }
    }

    #[test]
    fn accepts_a_complete_candidate() {
        let draft = validate(&candidate(), today()).unwrap();

        assert_eq!(draft.person, "Anvar");
        assert_eq!(draft.amount, 250_000);
        assert_eq!(draft.currency, Currency::Uzs);
        assert_eq!(draft.date, today());
        assert_eq!(draft.due, NaiveDate::from_ymd_opt(2025, 4, 20).unwrap());
        assert_eq!(draft.comment.as_deref(), Some("lunch"));
    }

    #[test]
    fn rejects_unknown_currency() {
        let mut candidate = candidate();
        candidate.currency = Some("SOM".to_owned());

        let err = validate(&candidate, today()).unwrap_err();

        assert_eq!(err, ValidationError::UnknownCurrency("SOM".to_owned()));
    }

    #[test]
    fn rejects_non_iso_dates() {
        let mut candidate = candidate();
        candidate.due = Some("20.04.2025".to_owned());

        let err = validate(&candidate, today()).unwrap_err();

        assert_eq!(err, ValidationError::MalformedDate("20.04.2025".to_owned()));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let mut candidate = candidate();
        candidate.amount = Some(-5);

        assert_eq!(
            validate(&candidate, today()).unwrap_err(),
            ValidationError::NonPositiveAmount(-5)
        );

        candidate.amount = None;

        assert_eq!(
            validate(&candidate, today()).unwrap_err(),
            ValidationError::NonPositiveAmount(0)
        );
    }

    #[test]
    fn defaults_fill_missing_currency_and_due() {
        let mut candidate = candidate();
        candidate.currency = None;
        candidate.due = None;

        let draft = validate(&candidate, today()).unwrap();

        assert_eq!(draft.currency, Currency::Uzs);
        assert_eq!(draft.due, NaiveDate::from_ymd_opt(2025, 4, 17).unwrap());
    }

    #[test]
    fn not_understood_is_unparsable() {
        let mut candidate = candidate();
        candidate.understood = false;

        assert!(matches!(outcome(candidate, today()), ParseOutcome::Unparsable));
    }

    #[test]
    fn invalid_candidate_is_unparsable() {
        let mut candidate = candidate();
        candidate.person = None;

        assert!(matches!(outcome(candidate, today()), ParseOutcome::Unparsable));
    }

    #[test]
    fn parses_function_arguments_json() {
        let arguments = r#"{
            "understood": true,
            "direction": "owed",
            "person": "Umid",
            "amount": 100,
            "currency": "USD",
            "due": null,
            "comment": null
        }"#;

        let candidate: DebtCandidate = serde_json::from_str(arguments).unwrap();

        let draft = validate(&candidate, today()).unwrap();

        assert_eq!(draft.person, "Umid");
        assert_eq!(draft.currency, Currency::Usd);
        assert!(!draft.direction.is_owe());
        assert!(draft.comment.is_none());
    }
}
