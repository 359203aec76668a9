//! OBS Studio destination over the obs-websocket v5 protocol.

use core::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use likesync_common::obs::{
    self, Envelope, Hello, Identified, Identify, Request, RequestResponse, SetInputSettings, op,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info};

use super::{DestinationSink, SinkConnector, SinkError, SinkTarget};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the OBS control socket and identifies.
#[derive(Debug, Clone)]
pub struct ObsConnector {
    /// Upper bound for opening the socket plus the Hello/Identify exchange.
    pub handshake_timeout: Duration,
    /// Upper bound for one request/response round trip.
    pub request_timeout: Duration,
}

impl Default for ObsConnector {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Accepts `host:port` as well as full `ws://`/`wss://` URLs.
fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    }
}

/// Reads frames until a text frame arrives and decodes its envelope.
async fn next_envelope(socket: &mut Socket) -> Result<Envelope, String> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str())
                    .map_err(|e| format!("malformed frame: {e}"));
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(frame.map_or_else(
                    || "connection closed by OBS".to_string(),
                    |f| {
                        format!(
                            "connection closed by OBS ({}): {}",
                            u16::from(f.code),
                            f.reason.as_str()
                        )
                    },
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("connection closed".to_string()),
        }
    }
}

async fn send_envelope<D: Serialize>(socket: &mut Socket, op: u8, d: D) -> Result<(), String> {
    let json = serde_json::to_string(&Envelope::new(op, d)).map_err(|e| e.to_string())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

fn payload<D: DeserializeOwned>(envelope: Envelope) -> Result<D, String> {
    serde_json::from_value(envelope.d).map_err(|e| format!("malformed payload: {e}"))
}

async fn handshake(socket: &mut Socket, target: &SinkTarget) -> Result<u32, String> {
    let hello = next_envelope(socket).await?;
    if hello.op != op::HELLO {
        return Err(format!("expected Hello, got opcode {}", hello.op));
    }
    let hello: Hello = payload(hello)?;

    let authentication = match (hello.authentication, target.credential.as_ref()) {
        (Some(challenge), Some(password)) => {
            Some(obs::authentication_string(password, &challenge))
        }
        (Some(_), None) => return Err("OBS requires a password but none is configured".into()),
        (None, _) => None,
    };

    send_envelope(
        socket,
        op::IDENTIFY,
        Identify {
            rpc_version: obs::RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        },
    )
    .await?;

    let identified = next_envelope(socket).await?;
    if identified.op != op::IDENTIFIED {
        return Err(format!("expected Identified, got opcode {}", identified.op));
    }
    let identified: Identified = payload(identified)?;
    Ok(identified.negotiated_rpc_version)
}

impl SinkConnector for ObsConnector {
    type Sink = ObsSink;

    async fn connect(&self, target: &SinkTarget) -> Result<ObsSink, SinkError> {
        let url = endpoint_url(&target.endpoint);
        let connection_error = |reason: String| SinkError::Connection {
            endpoint: target.endpoint.clone(),
            reason,
        };

        let identified = timeout(self.handshake_timeout, async {
            let (mut socket, _) = connect_async(url.as_str())
                .await
                .map_err(|e| e.to_string())?;
            let rpc_version = handshake(&mut socket, target).await?;
            Ok::<_, String>((socket, rpc_version))
        })
        .await
        .map_err(|_| connection_error("handshake timed out".to_string()))?;

        let (socket, rpc_version) = identified.map_err(connection_error)?;
        info!(endpoint = %url, rpc_version, "Identified with OBS");

        Ok(ObsSink {
            socket,
            target: target.clone(),
            next_request_id: 0,
            request_timeout: self.request_timeout,
        })
    }
}

/// Open, identified OBS connection writing to one input.
pub struct ObsSink {
    socket: Socket,
    target: SinkTarget,
    next_request_id: u64,
    request_timeout: Duration,
}

impl ObsSink {
    async fn set_input_settings(&mut self, value: String) -> Result<(), String> {
        self.next_request_id += 1;
        let request_id = self.next_request_id.to_string();
        let data = SetInputSettings::single(
            &self.target.destination_name,
            &self.target.property,
            value,
        );
        let request = Request {
            request_type: "SetInputSettings".to_string(),
            request_id: request_id.clone(),
            request_data: Some(serde_json::to_value(data).map_err(|e| e.to_string())?),
        };
        send_envelope(&mut self.socket, op::REQUEST, request).await?;

        loop {
            let envelope = next_envelope(&mut self.socket).await?;
            if envelope.op != op::REQUEST_RESPONSE {
                debug!(op = envelope.op, "Ignoring unrelated OBS frame");
                continue;
            }
            let response: RequestResponse = payload(envelope)?;
            if response.request_id != request_id {
                debug!(request_id = %response.request_id, "Ignoring response to another request");
                continue;
            }
            let status = response.request_status;
            return if status.result {
                Ok(())
            } else {
                Err(format!(
                    "OBS rejected the request (code {}): {}",
                    status.code,
                    status.comment.as_deref().unwrap_or("no comment")
                ))
            };
        }
    }
}

impl DestinationSink for ObsSink {
    async fn push(&mut self, count: u64) -> Result<(), SinkError> {
        let value = self.target.render(count);
        let request_timeout = self.request_timeout;
        let result = match timeout(request_timeout, self.set_input_settings(value)).await {
            Ok(result) => result,
            Err(_) => Err("request timed out".to_string()),
        };
        result.map_err(|reason| SinkError::Update {
            destination: self.target.destination_name.clone(),
            reason,
        })
    }
}
