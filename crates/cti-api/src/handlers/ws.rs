//! WebSocket handler for model change notifications
//!
//! Every connected client gets its own subscription on the notification bus.
//! A client that falls behind loses the skipped notifications and keeps its
//! connection.

use crate::dto::ViewParams;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use cti_core::Privacy;
use cti_engine::{EngineContext, Notification, NotificationBus};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// WebSocket connection handler
///
/// GET /ws?privacy=1
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<ViewParams>,
    ctx: web::Data<EngineContext>,
    bus: web::Data<NotificationBus>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    info!(client = %client_ip, "WebSocket connection established");

    let privacy = query.privacy(ctx.config()).cloned();
    let notifications = bus.subscribe();
    actix_web::rt::spawn(async move {
        ws_session(session, msg_stream, notifications, privacy, client_ip).await;
    });

    Ok(response)
}

async fn send(session: &mut Session, notification: &Notification, privacy: Option<&Privacy>) -> bool {
    let payload = notification.to_json(privacy).to_string();
    session.text(payload).await.is_ok()
}

async fn ws_session(
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    mut notifications: broadcast::Receiver<Notification>,
    privacy: Option<Privacy>,
    client_ip: String,
) {
    let mut ping_interval = interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        info!(client = %client_ip, "Client closed connection: {:?}", reason);
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(client = %client_ip, "Ignoring client text: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(client = %client_ip, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            received = notifications.recv() => {
                match received {
                    Ok(notification) => {
                        if !send(&mut session, &notification, privacy.as_ref()).await {
                            warn!(client = %client_ip, "Failed to send notification, closing connection");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client = %client_ip, skipped, "Client lagging behind notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if session.ping(b"").await.is_err() {
                    warn!(client = %client_ip, "Failed to send ping, closing connection");
                    break;
                }
            }
        }
    }

    info!(client = %client_ip, "WebSocket connection closed");
    let _ = session.close(None).await;
}
