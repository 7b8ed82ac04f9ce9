use crate::error::{Error, Result};
use crate::exchange::models::WsTicker;
use crate::exchange::{TickerFeed, TickerStream};
use crate::types::SymbolStats;
use async_trait::async_trait;
use futures_util::{stream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// All-market 24h ticker push stream (`!ticker@arr`). The venue sends one
/// array per second containing only the symbols that changed.
#[derive(Clone)]
pub struct MarketStreams {
    base_url: String,
}

impl MarketStreams {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    fn url(&self) -> String {
        format!("{}/ws/!ticker@arr", self.base_url.trim_end_matches('/').trim_end_matches("/ws"))
    }
}

/// Parses one `!ticker@arr` text frame. Non-ticker and malformed elements are
/// skipped; only a frame that is not a JSON array fails.
pub fn parse_ticker_batch(text: &str) -> Result<Vec<SymbolStats>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut out = Vec::with_capacity(raw.len());
    for v in raw {
        if v.get("e").and_then(|e| e.as_str()) != Some("24hrTicker") {
            continue;
        }
        let symbol = v.get("s").and_then(|s| s.as_str()).unwrap_or("?").to_string();
        match serde_json::from_value::<WsTicker>(v) {
            Ok(t) => out.push(t.into()),
            Err(e) => tracing::warn!(%symbol, error = %e, "skipping malformed ticker element"),
        }
    }
    Ok(out)
}

#[async_trait]
impl TickerFeed for MarketStreams {
    async fn subscribe(&self) -> Result<TickerStream> {
        let url = self.url();
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| Error::Feed(format!("connect {}: {}", url, e)))?;
        tracing::info!(%url, "connected to market ticker stream");

        let (mut write, mut read) = ws.split();
        let (tx, rx) = mpsc::channel::<Result<Vec<SymbolStats>>>(64);

        // Reader task: decode batches and answer pings. Ends (dropping tx, which
        // ends the stream) on close or error.
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(t)) => match parse_ticker_batch(&t) {
                        Ok(batch) => {
                            if tx.send(Ok(batch)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error=?e, "ticker batch parse failed"),
                    },
                    Ok(Message::Ping(p)) => {
                        if let Err(e) = write.send(Message::Pong(p)).await {
                            tracing::warn!(error=?e, "failed to send pong");
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::warn!(?frame, "ticker stream closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.send(Err(Error::Feed(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        let batches = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(batches.boxed())
    }
}
