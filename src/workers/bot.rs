use indoc::formatdoc;
use sea_orm::Iterable;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::app::App;
use crate::entity::prelude::UserLocale;
use crate::scheduler::jobs;
use crate::telegram::commands::UserCommand;
use crate::telegram::errors as error_handler;
use crate::{self as qarzbot};

#[tracing::instrument(skip_all)]
pub async fn work() {
    qarzbot::logger::init().await.expect("Logger should be built");

    tracing::info!(
        git_commit_timestamp = env!("GIT_COMMIT_TIMESTAMP"),
        git_sha = env!("GIT_SHA"),
        "Starting QarzBot..."
    );

    let app = App::init().await.expect("State to be built");

    for locale in UserLocale::iter() {
        app.bot()
            .set_my_commands(UserCommand::localized_bot_commands(locale.as_ref()))
            .language_code(locale.as_ref())
            .await
            .expect("update commands should be working");
    }

    if let Err(err) = jobs::rebuild(app).await {
        tracing::error!(err = ?err, "Initial schedule rebuild failed");
    }

    tokio::spawn(jobs::scheduled_messages_worker(app));
    tokio::spawn(qarzbot::utils::listen_for_ctrl_c());

    let handler = dptree::entry()
        .branch(
            Update::filter_message().endpoint(move |m: Message| async move {
                let state = app.user_state(m.chat.id.0).await?;

                let result = qarzbot::telegram::handle_message(app, &state, m.clone()).await;

                if let Err(mut err) = result {
                    let res =
                        error_handler::handle(&mut err, app, state.user_id(), state.locale())
                            .await;

                    if !res.user_notified {
                        app.bot()
                            .send_message(
                                m.chat.id,
                                formatdoc!(
                                    "
                                        <b>Sorry, something went wrong :(</b>

                                        Try again a bit later
                                    "
                                ),
                            )
                            .parse_mode(ParseMode::Html)
                            .await?;
                    };
                }

                Ok(())
            }),
        )
        .branch(Update::filter_callback_query().endpoint(
            move |q: CallbackQuery| async move {
                let state = app.user_state(q.from.id.0 as i64).await?;

                qarzbot::telegram::handlers::inline_buttons::handle(app, &state, q).await
            },
        ));

    let mut dispatcher = Dispatcher::builder(app.bot().clone(), handler)
        .distribution_function(|_| None::<()>)
        .build();

    let token = dispatcher.shutdown_token();

    tokio::spawn(async move {
        qarzbot::utils::ctrl_c().await;

        token.shutdown().expect("To be good").await;

        app.scheduler().shutdown().await;
    });

    dispatcher.dispatch().await;
}
