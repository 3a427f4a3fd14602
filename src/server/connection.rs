//! Per-connection RTMP driver
//!
//! Each accepted TCP peer gets one task running [`RtmpConnection::run`]: the
//! RTMP handshake, then an event loop over the `rml_rtmp` server session.
//! A publishing peer feeds its session's broadcast queue; a playing peer
//! (in practice the transcoder pulling the stream back, or any RTMP player)
//! drains a cursor into `send_*_data` calls. Closing the socket is the only
//! thing that ends a connection.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::sessions::{
    ServerSession, ServerSessionConfig, ServerSessionEvent, ServerSessionResult,
};
use rml_rtmp::time::RtmpTimestamp;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::relay::{BroadcastQueue, Cursor, MediaPacket, PacketKind, RelayHub, StreamHeader};
use crate::session::{IngestSupervisor, SessionHandle};

const READ_BUFFER_SIZE: usize = 4096;

struct PlayState {
    stream_id: u32,
    queue: Arc<BroadcastQueue>,
    cursor: Cursor,
    sent_header: bool,
}

/// One accepted RTMP connection (publisher or player)
pub struct RtmpConnection {
    session_id: u64,
    peer_addr: SocketAddr,
    supervisor: Arc<IngestSupervisor>,
    hub: Arc<RelayHub>,
    publishing: Option<SessionHandle>,
    pending_play: Option<PlayState>,
    close_after_flush: bool,
}

impl RtmpConnection {
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        supervisor: Arc<IngestSupervisor>,
        hub: Arc<RelayHub>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            supervisor,
            hub,
            publishing: None,
            pending_play: None,
            close_after_flush: false,
        }
    }

    /// Drive the connection to completion
    ///
    /// Teardown runs on every exit path: if the peer was publishing, its
    /// session is ended (transcoder signaled, queue closed and replaced).
    pub async fn run(mut self, stream: TcpStream) -> Result<()> {
        let result = self.drive(stream).await;

        if let Some(handle) = self.publishing.take() {
            self.supervisor.end_session(&handle);
        }

        result
    }

    async fn drive(&mut self, mut stream: TcpStream) -> Result<()> {
        let leftover = self.handshake(&mut stream).await?;

        let (mut session, initial) = ServerSession::new(ServerSessionConfig::new())
            .map_err(|e| Error::Session(format!("{:?}", e)))?;
        for result in initial {
            if let ServerSessionResult::OutboundResponse(packet) = result {
                stream.write_all(&packet.bytes).await?;
            }
        }

        if !leftover.is_empty() {
            let results = session
                .handle_input(&leftover)
                .map_err(|e| Error::Session(format!("{:?}", e)))?;
            self.process_results(&mut session, &mut stream, results)
                .await?;
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if let Some(play) = self.pending_play.take() {
                return self.play_loop(session, stream, play).await;
            }
            if self.close_after_flush {
                return Ok(());
            }

            let n = stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!(session_id = self.session_id, "Peer closed connection");
                return Ok(());
            }

            let results = session
                .handle_input(&buf[..n])
                .map_err(|e| Error::Session(format!("{:?}", e)))?;
            self.process_results(&mut session, &mut stream, results)
                .await?;
        }
    }

    /// Server side of the RTMP handshake; returns bytes received past it
    async fn handshake(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut handshake = Handshake::new(PeerType::Server);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }

            match handshake.process_bytes(&buf[..n]) {
                Ok(HandshakeProcessResult::InProgress { response_bytes }) => {
                    if !response_bytes.is_empty() {
                        stream.write_all(&response_bytes).await?;
                    }
                }
                Ok(HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                }) => {
                    if !response_bytes.is_empty() {
                        stream.write_all(&response_bytes).await?;
                    }
                    return Ok(remaining_bytes);
                }
                Err(e) => return Err(Error::Handshake(format!("{:?}", e))),
            }
        }
    }

    async fn process_results(
        &mut self,
        session: &mut ServerSession,
        stream: &mut TcpStream,
        results: Vec<ServerSessionResult>,
    ) -> Result<()> {
        let mut pending: VecDeque<ServerSessionResult> = results.into();

        while let Some(result) = pending.pop_front() {
            match result {
                ServerSessionResult::OutboundResponse(packet) => {
                    stream.write_all(&packet.bytes).await?;
                }
                ServerSessionResult::RaisedEvent(event) => {
                    let more = self.handle_event(session, event).await?;
                    pending.extend(more);
                }
                ServerSessionResult::UnhandleableMessageReceived(payload) => {
                    tracing::trace!(
                        session_id = self.session_id,
                        type_id = payload.type_id,
                        "Unhandleable RTMP message"
                    );
                }
            }
        }

        Ok(())
    }

    async fn handle_event(
        &mut self,
        session: &mut ServerSession,
        event: ServerSessionEvent,
    ) -> Result<Vec<ServerSessionResult>> {
        match event {
            ServerSessionEvent::ConnectionRequested {
                request_id,
                app_name,
            } => {
                tracing::debug!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    app = %app_name,
                    "Connection requested"
                );
                session
                    .accept_request(request_id)
                    .map_err(|e| Error::Session(format!("{:?}", e)))
            }

            ServerSessionEvent::PublishStreamRequested {
                request_id,
                app_name,
                stream_key,
                mode,
            } => {
                tracing::info!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    app = %app_name,
                    key = %stream_key,
                    mode = ?mode,
                    "Publish requested"
                );

                let handle = self
                    .supervisor
                    .begin_session(self.session_id, &app_name, &stream_key)
                    .await;
                self.publishing = Some(handle);

                session
                    .accept_request(request_id)
                    .map_err(|e| Error::Session(format!("{:?}", e)))
            }

            ServerSessionEvent::PublishStreamFinished {
                app_name: _,
                stream_key,
            } => {
                tracing::debug!(
                    session_id = self.session_id,
                    key = %stream_key,
                    "Publish finished"
                );
                if let Some(handle) = self.publishing.take() {
                    self.supervisor.end_session(&handle);
                }
                Ok(Vec::new())
            }

            ServerSessionEvent::StreamMetadataChanged { metadata, .. } => {
                if let Some(handle) = &self.publishing {
                    handle.queue.write_header(metadata);
                }
                Ok(Vec::new())
            }

            ServerSessionEvent::AudioDataReceived {
                data, timestamp, ..
            } => {
                if let Some(handle) = &self.publishing {
                    handle
                        .queue
                        .write(MediaPacket::audio(timestamp.value, data))?;
                }
                Ok(Vec::new())
            }

            ServerSessionEvent::VideoDataReceived {
                data, timestamp, ..
            } => {
                if let Some(handle) = &self.publishing {
                    handle
                        .queue
                        .write(MediaPacket::video(timestamp.value, data))?;
                }
                Ok(Vec::new())
            }

            ServerSessionEvent::PlayStreamRequested {
                request_id,
                app_name,
                stream_key,
                stream_id,
                ..
            } => {
                let resolved = self.supervisor.resolve_key(&stream_key);
                tracing::info!(
                    session_id = self.session_id,
                    peer = %self.peer_addr,
                    app = %app_name,
                    stream = %resolved,
                    "Play requested"
                );

                match self.hub.current(&resolved) {
                    Some(queue) => {
                        self.pending_play = Some(PlayState {
                            stream_id,
                            cursor: queue.cursor(),
                            queue,
                            sent_header: false,
                        });
                    }
                    None => {
                        // No session has ever run under this identity; accept
                        // and end, the viewer sees a stream with no data
                        tracing::debug!(
                            session_id = self.session_id,
                            stream = %resolved,
                            "Play requested for idle stream"
                        );
                        self.close_after_flush = true;
                    }
                }

                session
                    .accept_request(request_id)
                    .map_err(|e| Error::Session(format!("{:?}", e)))
            }

            event => {
                tracing::trace!(
                    session_id = self.session_id,
                    event = ?event,
                    "Unhandled RTMP event"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Steady state for a playing peer: relay cursor packets until the
    /// viewer disconnects or the session's queue closes
    async fn play_loop(
        &mut self,
        mut session: ServerSession,
        mut stream: TcpStream,
        mut play: PlayState,
    ) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                read = stream.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        tracing::debug!(session_id = self.session_id, "Player disconnected");
                        return Ok(());
                    }
                    let results = session
                        .handle_input(&buf[..n])
                        .map_err(|e| Error::Session(format!("{:?}", e)))?;
                    for result in results {
                        match result {
                            ServerSessionResult::OutboundResponse(packet) => {
                                stream.write_all(&packet.bytes).await?;
                            }
                            ServerSessionResult::RaisedEvent(
                                ServerSessionEvent::PlayStreamFinished { .. },
                            ) => {
                                return Ok(());
                            }
                            other => {
                                tracing::trace!(
                                    session_id = self.session_id,
                                    result = ?other,
                                    "Ignored while playing"
                                );
                            }
                        }
                    }
                }
                packet = play.cursor.next() => {
                    match packet {
                        Some(packet) => {
                            if !play.sent_header {
                                if let Some(header) = play.queue.header() {
                                    self.send_header(&mut session, &mut stream, play.stream_id, &header)
                                        .await?;
                                    play.sent_header = true;
                                }
                            }
                            self.send_media(&mut session, &mut stream, play.stream_id, packet)
                                .await?;
                        }
                        None => {
                            tracing::debug!(
                                session_id = self.session_id,
                                "Session ended, closing player"
                            );
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Send the session header: metadata plus decoder-configuration packets
    async fn send_header(
        &self,
        session: &mut ServerSession,
        stream: &mut TcpStream,
        stream_id: u32,
        header: &StreamHeader,
    ) -> Result<()> {
        if let Some(metadata) = &header.metadata {
            let packet = session
                .send_metadata(stream_id, metadata)
                .map_err(|e| Error::Session(format!("{:?}", e)))?;
            stream.write_all(&packet.bytes).await?;
        }

        for config in [&header.video_config, &header.audio_config]
            .into_iter()
            .flatten()
        {
            self.send_media(session, stream, stream_id, config.clone())
                .await?;
        }

        Ok(())
    }

    async fn send_media(
        &self,
        session: &mut ServerSession,
        stream: &mut TcpStream,
        stream_id: u32,
        packet: MediaPacket,
    ) -> Result<()> {
        let timestamp = RtmpTimestamp::new(packet.timestamp);
        let result = match packet.kind {
            PacketKind::Video => {
                let droppable = !packet.is_keyframe() && !packet.is_video_config();
                session.send_video_data(stream_id, packet.data, timestamp, droppable)
            }
            PacketKind::Audio => session.send_audio_data(stream_id, packet.data, timestamp, false),
        };

        let outbound = result.map_err(|e| Error::Session(format!("{:?}", e)))?;
        stream.write_all(&outbound.bytes).await?;
        Ok(())
    }
}
