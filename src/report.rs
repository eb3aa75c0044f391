//! Unexpected-error reporting.
//!
//! Errors that escape a handler are deduplicated by their rendered error
//! chain: the first occurrence gets a short identifier and a full context
//! report sent to the bot owner, repeats only bump a counter. The chat sees
//! a generic notice only when the debug flag is on - production default is
//! silent to users, loud to the owner.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InputFile, Message, ParseMode};
use tracing::{error, warn};

use crate::bot::dispatcher::ThrottledBot;
use crate::utils::html_escape;

/// Update context attached to an error report.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub chat_id: Option<i64>,
    pub chat_title: Option<String>,
    pub user_id: Option<u64>,
    pub message_text: Option<String>,
    pub callback_data: Option<String>,
}

impl ErrorContext {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            chat_id: Some(msg.chat.id.0),
            chat_title: msg.chat.title().map(String::from),
            user_id: msg.from.as_ref().map(|u| u.id.0),
            message_text: msg.text().map(String::from),
            callback_data: None,
        }
    }

    pub fn from_callback(q: &CallbackQuery) -> Self {
        Self {
            chat_id: q.message.as_ref().map(|m| m.chat().id.0),
            chat_title: q.message.as_ref().and_then(|m| m.chat().title().map(String::from)),
            user_id: Some(q.from.id.0),
            message_text: None,
            callback_data: q.data.clone(),
        }
    }
}

struct Occurrence {
    identifier: String,
    count: u32,
}

/// Deduplicating reporter delivering to the owner's private chat.
pub struct Reporter {
    owner: ChatId,
    debug: bool,
    ledger: Mutex<HashMap<String, Occurrence>>,
}

impl Reporter {
    pub fn new(owner_id: u64, debug: bool) -> Self {
        Self {
            owner: ChatId(owner_id as i64),
            debug,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    /// Report an unexpected error. Never fails: reporting problems are
    /// logged and swallowed.
    pub async fn report(&self, bot: &ThrottledBot, ctx: ErrorContext, err: &anyhow::Error) {
        let fingerprint = format!("{:#}", err);
        error!("Unhandled error: {}", fingerprint);

        // Same error verbatim: only increment its occurrence count.
        let identifier = {
            use std::collections::hash_map::Entry;

            let mut ledger = self.ledger.lock();
            match ledger.entry(fingerprint.clone()) {
                Entry::Occupied(mut seen) => {
                    seen.get_mut().count += 1;
                    None
                }
                Entry::Vacant(slot) => {
                    let identifier = new_identifier();
                    slot.insert(Occurrence {
                        identifier: identifier.clone(),
                        count: 1,
                    });
                    Some(identifier)
                }
            }
        };

        if self.debug {
            if let Some(chat_id) = ctx.chat_id {
                let _ = bot
                    .send_message(
                        ChatId(chat_id),
                        format!(
                            "<b>Sorry, I ran into an error!</b>\n<b>Error</b>: <code>{}</code>\n\
                             <i>This incident has been logged.</i>",
                            html_escape(&fingerprint)
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .await;
            }
        }

        let identifier = match identifier {
            Some(id) => id,
            None => return,
        };

        let payload = serde_json::json!({
            "user": ctx.user_id,
            "chat": { "id": ctx.chat_id, "title": ctx.chat_title },
            "message": ctx.message_text,
            "callback_data": ctx.callback_data,
            "error": format!("{:?}", err),
        });
        let payload = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| fingerprint.clone());

        let caption = format!(
            "#{}\n<b>Unhandled exception caught:</b>\n<code>{}</code>",
            identifier,
            html_escape(&fingerprint)
        );

        let delivery = if payload.len() > 3000 {
            bot.send_document(
                self.owner,
                InputFile::memory(payload.into_bytes()).file_name("error.txt"),
            )
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
        } else {
            bot.send_message(
                self.owner,
                format!("{}\n\n<pre>{}</pre>", caption, html_escape(&payload)),
            )
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
        };

        if let Err(e) = delivery {
            warn!("Could not deliver error report to owner: {}", e);
        }
    }

    /// The dedup ledger as (identifier, count, fingerprint) rows, most
    /// frequent first. Used by the dev /errors listing.
    pub fn occurrences(&self) -> Vec<(String, u32, String)> {
        let ledger = self.ledger.lock();
        let mut rows: Vec<_> = ledger
            .iter()
            .map(|(fp, o)| (o.identifier.clone(), o.count, fp.clone()))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

fn new_identifier() -> String {
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_shape() {
        let id = new_identifier();
        assert_eq!(id.len(), 5);
        assert!(id.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_dedup_counts() {
        let reporter = Reporter::new(1, false);
        let err = anyhow::anyhow!("boom");
        let fp = format!("{:#}", err);

        {
            let mut ledger = reporter.ledger.lock();
            ledger.insert(
                fp.clone(),
                Occurrence {
                    identifier: "ABCDE".into(),
                    count: 1,
                },
            );
        }
        {
            let mut ledger = reporter.ledger.lock();
            ledger.get_mut(&fp).unwrap().count += 1;
        }

        let rows = reporter.occurrences();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, 2);
    }
}
