use anyhow::Result;
use shellsage_app::config::Config;
use shellsage_app::telegram::{TelegramClient, TelegramMessenger, Update};
use shellsage_app::workspace::GeneratedFiles;
use shellsage_core::ConversationEngine;
use shellsage_executor::Messenger;
use shellsage_memory::{ChatHistoryStore, SessionContextStore};
use shellsage_providers::{AssistantModels, LanguageModel, OpenAiCompatibleClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";
const POLL_TIMEOUT_SECS: u64 = 30;

const WELCOME: &str = "Hello! I am your shell & code assistant.\n\n\
1. *Run shell commands*: type a command or a natural instruction (e.g. `show the directory contents`).\n\
2. *Generate Python code*: describe the program (e.g. `write a python function for factorials`).\n\
3. *General conversation*: just send a message.\n\n\
Extra commands:\n\
/listfiles - list generated scripts\n\
/deletefile <name> - delete a generated script\n\
/clear\\_chat - clear the conversation history\n\
/stop - interrupt the running command";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(Path::new(CONFIG_PATH))?;
    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        return Err(e);
    }

    info!(
        chat_id = %config.telegram.allowed_chat_id,
        base_url = %config.llm.base_url,
        "starting shellsage"
    );

    let client = Arc::new(TelegramClient::new(&config.telegram.bot_token));
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(Arc::clone(&client)));

    let base = OpenAiCompatibleClient::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.models.chat.clone(),
    );
    let routes = &config.llm.models;
    let models = Arc::new(AssistantModels {
        intent: arc_model(base.with_model(&routes.intent)),
        converter: arc_model(base.with_model(&routes.converter)),
        coder: arc_model(base.with_model(&routes.coder)),
        advisor: arc_model(base.with_model(&routes.advisor)),
        chat: arc_model(base),
    });

    let files = Arc::new(GeneratedFiles::new(&config.workspace_dir));
    files.init().await?;

    let engine = Arc::new(ConversationEngine::new(
        Arc::new(SessionContextStore::new()),
        Arc::new(ChatHistoryStore::new()),
        models,
        Arc::clone(&messenger),
        Arc::clone(&files) as Arc<dyn shellsage_core::FileStore>,
    ));

    info!("shellsage is running; press Ctrl+C to stop");

    let mut offset = 0i64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            polled = client.get_updates(offset, POLL_TIMEOUT_SECS) => {
                match polled {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            dispatch(&config, &engine, &messenger, &files, update).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "polling failed, backing off");
                        tokio::time::sleep(Duration::from_secs(3)).await;
                    }
                }
            }
        }
    }

    Ok(())
}

fn arc_model(client: OpenAiCompatibleClient) -> Arc<dyn LanguageModel> {
    Arc::new(client)
}

async fn dispatch(
    config: &Config,
    engine: &Arc<ConversationEngine>,
    messenger: &Arc<dyn Messenger>,
    files: &Arc<GeneratedFiles>,
    update: Update,
) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text else {
        return;
    };
    let chat_id = message.chat.id.to_string();

    if chat_id != config.telegram.allowed_chat_id {
        warn!(chat_id, "unauthorized chat");
        messenger
            .send(
                &chat_id,
                "You are not allowed to interact with this assistant. Contact the operator.",
            )
            .await;
        return;
    }

    let trimmed = text.trim().to_string();
    match trimmed.as_str() {
        "/start" => {
            messenger.send(&chat_id, WELCOME).await;
        }
        "/listfiles" => match files.list_scripts().await {
            Ok(names) if names.is_empty() => {
                messenger.send(&chat_id, "No generated scripts yet.").await;
            }
            Ok(names) => {
                let listing: Vec<String> =
                    names.iter().map(|n| format!("- `{}`", n)).collect();
                messenger
                    .send(
                        &chat_id,
                        &format!("Generated scripts:\n{}", listing.join("\n")),
                    )
                    .await;
            }
            Err(e) => {
                messenger
                    .send(&chat_id, &format!("Could not list scripts: {}", e))
                    .await;
            }
        },
        "/clear_chat" => {
            let cleared = engine.clear_history(&chat_id);
            let reply = if cleared {
                "Your conversation history has been cleared."
            } else {
                "There is no conversation history to clear."
            };
            messenger.send(&chat_id, reply).await;
        }
        "/stop" => {
            engine.interrupt(&chat_id);
            messenger
                .send(&chat_id, "Interrupt sent to the running command.")
                .await;
        }
        _ if trimmed.starts_with("/deletefile") => {
            let name = trimmed.trim_start_matches("/deletefile").trim();
            if name.is_empty() {
                messenger
                    .send(&chat_id, "Usage: /deletefile <name.py>")
                    .await;
                return;
            }
            match files.delete_script(name).await {
                Ok(true) => {
                    messenger
                        .send(&chat_id, &format!("Deleted `{}`.", name))
                        .await;
                }
                Ok(false) => {
                    messenger
                        .send(&chat_id, &format!("`{}` was not found.", name))
                        .await;
                }
                Err(e) => {
                    messenger
                        .send(&chat_id, &format!("Could not delete `{}`: {}", name, e))
                        .await;
                }
            }
        }
        _ if trimmed.starts_with('/') => {
            messenger
                .send(&chat_id, "Unknown command. Send /start to see what I can do.")
                .await;
        }
        _ => {
            // Long-running commands must not block the poll loop; the
            // engine's per-session guard keeps one message in flight.
            let engine = Arc::clone(engine);
            tokio::spawn(async move {
                engine.handle_message(&chat_id, &trimmed).await;
            });
        }
    }
}
