//! One controller connection.
//!
//! A single task owns the socket and multiplexes three event sources:
//! incoming request lines, the status-feed timer (only while subscribed),
//! and server shutdown. Since one task does all the writing, responses and
//! status pushes never interleave mid-line.

use crate::error::{ServerError, ServerResult};
use crate::protocol::{
    ClientRequest, ServerResponse, MAX_LINE_LENGTH, OP_ADD_PROCESS, OP_COMMAND, OP_STATUS_FEED,
};
use futures::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watchdog_supervisor::ControlApi;

pub(crate) struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    api: ControlApi,
    status_interval: Duration,
    shutdown: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        stream: TcpStream,
        peer: SocketAddr,
        api: ControlApi,
        status_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer,
            api,
            status_interval,
            shutdown,
        }
    }

    /// Serve the connection until the peer closes it, a malformed line
    /// arrives, or the server shuts down.
    pub(crate) async fn run(mut self) -> ServerResult<()> {
        let (reader, mut writer) = self.stream.split();
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        // Subscription state lives and dies with the connection.
        let mut subscribed = false;
        let mut feed = status_ticker(self.status_interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Closing connection from {} for shutdown", self.peer);
                    break;
                }
                line = lines.next() => {
                    let Some(line) = line else {
                        debug!("{} closed the connection", self.peer);
                        break;
                    };
                    let line = line.map_err(framing_error)?;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let request = ClientRequest::parse(line)?;
                    let response = match request.opcode {
                        OP_STATUS_FEED => {
                            if request.send && !subscribed {
                                feed = status_ticker(self.status_interval);
                            }
                            subscribed = request.send;
                            info!("{} status feed {}", self.peer, if subscribed { "on" } else { "off" });
                            ServerResponse::success(if subscribed {
                                "Status transmission started"
                            } else {
                                "Status transmission stopped"
                            })
                        }
                        OP_COMMAND => handle_command(&self.api, &request).await,
                        OP_ADD_PROCESS => handle_add(&self.api, &request).await,
                        other => {
                            debug!("{} sent unknown opcode {}", self.peer, other);
                            ServerResponse::unknown_command()
                        }
                    };
                    send(&mut writer, &response).await?;
                }
                _ = feed.tick(), if subscribed => {
                    let views = self.api.statuses().await;
                    send(&mut writer, &ServerResponse::statuses(&views)?).await?;
                }
            }
        }

        Ok(())
    }
}

fn framing_error(e: LinesCodecError) -> ServerError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            ServerError::Protocol(format!("request line exceeds {} bytes", MAX_LINE_LENGTH))
        }
        LinesCodecError::Io(e) => ServerError::Io(e),
    }
}

/// New feed timer; its first tick fires immediately.
fn status_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Command results are always reported as success; the message carries
/// the outcome.
async fn handle_command(api: &ControlApi, request: &ClientRequest) -> ServerResponse {
    let name = request.program_name.as_deref().unwrap_or_default();
    match api
        .handle_command(name, request.command, request.command_options())
        .await
    {
        Ok(message) => ServerResponse::success(message),
        Err(e) => {
            if e.is_validation() {
                debug!("Command {} on {} rejected: {}", request.command, name, e);
            } else {
                warn!("Command {} on {} failed: {}", request.command, name, e);
            }
            ServerResponse::success(e.to_string())
        }
    }
}

async fn handle_add(api: &ControlApi, request: &ClientRequest) -> ServerResponse {
    match api.add_process(request.add_request()).await {
        Ok(()) => ServerResponse::success("Program added successfully"),
        Err(e) => {
            warn!("Add of {:?} failed: {}", request.file_path, e);
            ServerResponse::failure(format!("Program addition failed: {}", e))
        }
    }
}

async fn send<W>(writer: &mut W, response: &ServerResponse) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let line = response.to_line()?;
    writer.write_all(line.as_bytes()).await.map_err(ServerError::Io)?;
    writer.flush().await.map_err(ServerError::Io)
}
