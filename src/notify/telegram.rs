use crate::error::NotifyError;
use crate::report::split_message;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";
/// Older deployments exported the token under this name
pub const LEGACY_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Bot token plus the destination chat, both taken from the environment
#[derive(Debug, Clone)]
pub struct TelegramCredentials {
    pub token: String,
    pub chat_id: Option<String>,
}

impl TelegramCredentials {
    /// `None` when no token is set
    pub fn from_env() -> Option<Self> {
        let token = std::env::var(TOKEN_ENV)
            .or_else(|_| std::env::var(LEGACY_TOKEN_ENV))
            .ok()
            .filter(|t| !t.trim().is_empty())?;
        let chat_id = std::env::var(CHAT_ID_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty());

        Some(Self {
            token: token.trim().to_string(),
            chat_id: chat_id.map(|c| c.trim().to_string()),
        })
    }
}

// ============== Wire Types ==============

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
}

impl Update {
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

// ============== Client ==============

/// reqwest errors carry the request URL, and ours contains the bot token
fn transport(e: reqwest::Error) -> NotifyError {
    NotifyError::Http(e.without_url())
}

/// Minimal Telegram Bot API client: `sendMessage` and `getUpdates`
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    // Never log this: it embeds the token
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, NotifyError> {
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        let parsed: TelegramResponse<T> = serde_json::from_str(&body).map_err(|e| {
            NotifyError::Rejected(format!("{}: HTTP {} with unreadable body ({})", method, status, e))
        })?;

        if !parsed.ok || !status.is_success() {
            return Err(NotifyError::Rejected(format!(
                "{}: {}",
                method,
                parsed.description.unwrap_or_else(|| format!("HTTP {}", status))
            )));
        }

        parsed
            .result
            .ok_or_else(|| NotifyError::Rejected(format!("{}: missing result", method)))
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(transport)?;

        Self::decode::<serde_json::Value>("sendMessage", response).await?;
        Ok(())
    }

    /// Send `text` split into chunks of at most `max_chars`; stops at the first failure.
    /// Returns the number of messages sent.
    pub async fn send_report(
        &self,
        chat_id: &str,
        text: &str,
        max_chars: usize,
    ) -> Result<usize, NotifyError> {
        let parts = split_message(text, max_chars);
        for part in &parts {
            self.send_message(chat_id, part).await?;
        }
        Ok(parts.len())
    }

    /// One short `getUpdates` call starting at `offset`
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, NotifyError> {
        let mut query = vec![("timeout", "1".to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        Self::decode("getUpdates", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_send_message_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(serde_json::json!({
                "chat_id": "42",
                "text": "hello",
                "disable_web_page_preview": true
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":1}}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&server.url(), "TOKEN").unwrap();
        notifier.send_message("42", "hello").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(400)
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&server.url(), "TOKEN").unwrap();
        let err = notifier.send_message("42", "hello").await.unwrap_err();

        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_send_report_splits() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{}}"#)
            .expect(3)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&server.url(), "TOKEN").unwrap();
        let sent = notifier
            .send_report("42", &"a".repeat(25), 10)
            .await
            .unwrap();

        assert_eq!(sent, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_updates_with_offset() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/botTOKEN/getUpdates")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("offset".into(), "11".into()),
                Matcher::UrlEncoded("timeout".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"result":[
                    {"update_id":11,"message":{"message_id":5,"chat":{"id":42,"type":"private"},"text":"/status"}},
                    {"update_id":12,"edited_message":{"message_id":6,"chat":{"id":7,"type":"private"},"text":"/next"}},
                    {"update_id":13,"channel_post":{"message_id":7,"chat":{"id":9,"type":"channel"}}}
                ]}"#,
            )
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(&server.url(), "TOKEN").unwrap();
        let updates = notifier.get_updates(Some(11)).await.unwrap();

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message().unwrap().chat.id, 42);
        assert_eq!(updates[1].message().unwrap().text.as_deref(), Some("/next"));
        assert!(updates[2].message().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_hides_token() {
        // nothing listens on the discard port
        let notifier =
            TelegramNotifier::new("http://127.0.0.1:9", "123456:SECRET-BOT-TOKEN").unwrap();

        let err = notifier.send_message("42", "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
        for text in [err.to_string(), format!("{:#}", anyhow::Error::from(err))] {
            assert!(!text.contains("SECRET-BOT-TOKEN"), "{}", text);
        }

        let err = notifier.get_updates(Some(3)).await.unwrap_err();
        let text = format!("{:?}", err);
        assert!(!text.contains("SECRET-BOT-TOKEN"), "{}", text);
    }
}
