use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::action::AmiAction;
use crate::codec::{AmiCodec, AmiFrame};
use crate::constants;
use crate::error::AmiError;
use crate::token::new_token;

pub type AmiFramed = Framed<TcpStream, AmiCodec>;
pub type AmiReader = SplitStream<AmiFramed>;

/// Write half of a logged-in manager session
pub struct AmiConnection {
    sink: Mutex<SplitSink<AmiFramed, AmiAction>>,
    server_id: String,
}

impl AmiConnection {
    /// Connect, check the banner and log in with events enabled
    ///
    /// Returns the connection together with the read half, which the caller
    /// drives.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> Result<(Self, AmiReader), AmiError> {
        let server_id = format!("{}:{}", host, port);
        info!("Connecting to manager interface: {}", server_id);

        let stream = TcpStream::connect(&server_id).await?;
        let mut framed = Framed::new(stream, AmiCodec::new());

        let timeout = Duration::from_secs(constants::LOGIN_TIMEOUT_SECS);

        match tokio::time::timeout(timeout, framed.next())
            .await
            .map_err(|_| AmiError::Timeout)?
        {
            Some(Ok(AmiFrame::Greeting(banner))) => {
                if !banner.starts_with(constants::BANNER_PREFIX) {
                    return Err(AmiError::InvalidGreeting(banner));
                }
                debug!("Banner from {}: {}", server_id, banner);
            }
            Some(Ok(AmiFrame::Record(record))) => {
                return Err(AmiError::InvalidGreeting(record.to_string()));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(AmiError::Closed),
        }

        let login_id = new_token(constants::LOGIN_ACTION);
        framed
            .send(
                AmiAction::new("Login")
                    .with_action_id(login_id.as_str())
                    .field("Username", username)
                    .field("Secret", secret)
                    .field("Events", "on"),
            )
            .await?;

        // events may arrive before the login response; skip them
        loop {
            let frame = tokio::time::timeout(timeout, framed.next())
                .await
                .map_err(|_| AmiError::Timeout)?;

            match frame {
                Some(Ok(AmiFrame::Record(record))) if record.action_id() == Some(login_id.as_str()) => {
                    if record.is_success() {
                        break;
                    }
                    return Err(AmiError::LoginFailed(
                        record.message().unwrap_or("no reason given").to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e),
                None => return Err(AmiError::Closed),
            }
        }

        info!("Authenticated to manager interface: {}", server_id);

        let (sink, reader) = framed.split();
        Ok((
            Self {
                sink: Mutex::new(sink),
                server_id,
            },
            reader,
        ))
    }

    pub async fn send(&self, action: AmiAction) -> Result<(), AmiError> {
        debug!("-> {} {}", self.server_id, action);
        let mut sink = self.sink.lock().await;
        sink.send(action).await
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}
