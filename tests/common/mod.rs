// Common test utilities and helper functions
//
// A minimal publishing client plus media fixtures shared by the
// integration tests

#![allow(dead_code)]

use rtmp::{
    create_c2, read_control_u32, Amf0Object, Amf0Value, BitWriter, ChunkReader, ChunkWriter, Frame, MediaInfo,
    MediaRelay, RtmpCommand, RtmpHeader, RtmpPacket, RtmpServer, ServerConfig, C0C1, CMD_CONNECT,
    CMD_CREATE_STREAM, CMD_FC_PUBLISH, CMD_ON_STATUS, CMD_PUBLISH, CMD_RELEASE_STREAM, HANDSHAKE_SIZE,
    MSG_TYPE_COMMAND_AMF0, MSG_TYPE_SET_CHUNK_SIZE,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// `connect` as an encoder would send it
pub fn connect_command(app: &str) -> RtmpCommand {
    let object = Amf0Object::new()
        .with("app", app)
        .with("type", "nonprivate")
        .with("flashVer", "FMLE/3.0")
        .with("tcUrl", format!("rtmp://localhost/{}", app));
    RtmpCommand::new(CMD_CONNECT, 1.0).with_object(object)
}

/// releaseStream / FCPublish
pub fn stream_name_command(name: &str, transaction_id: f64, key: &str) -> RtmpCommand {
    RtmpCommand::new(name, transaction_id)
        .with_object(Amf0Value::Null)
        .with_argument(key)
}

pub fn create_stream_command(transaction_id: f64) -> RtmpCommand {
    RtmpCommand::new(CMD_CREATE_STREAM, transaction_id).with_object(Amf0Value::Null)
}

pub fn publish_command(key: &str, publish_type: &str) -> RtmpCommand {
    RtmpCommand::new(CMD_PUBLISH, 0.0)
        .with_object(Amf0Value::Null)
        .with_argument(key)
        .with_argument(publish_type)
}

/// Loopback config on an ephemeral port
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_connections: 10,
        ..ServerConfig::default()
    }
}

/// Baseline SPS NAL unit for a `width`x`height` picture (multiples of 16)
pub fn baseline_sps(width: u32, height: u32) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write(8, 0x67);
    w.write(8, 66); // profile
    w.write(8, 0);
    w.write(8, 30); // level
    w.write_golomb(0); // sps id
    w.write_golomb(0);
    w.write_golomb(0); // poc type
    w.write_golomb(0);
    w.write_golomb(1); // max refs
    w.write_bit(false);
    w.write_golomb(width / 16 - 1);
    w.write_golomb(height / 16 - 1);
    w.write_bit(true); // frame_mbs_only
    w.write_bit(true);
    w.write_bit(false); // no cropping
    w.write_bit(false); // no vui
    w.write_bit(true); // stop bit
    w.into_bytes()
}

/// FLV video tag body carrying an AVCDecoderConfigurationRecord
pub fn avc_sequence_header(width: u32, height: u32) -> Vec<u8> {
    let sps = baseline_sps(width, height);
    let mut payload = vec![0x17, 0x00, 0, 0, 0, 1, 66, 0x00, 30, 0xFF, 0xE1];
    payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    payload.extend_from_slice(&sps);
    payload.extend_from_slice(&[1, 0, 2, 0x68, 0xCE]);
    payload
}

/// AAC LC, 44.1 kHz, stereo
pub fn aac_sequence_header() -> Vec<u8> {
    vec![0xAF, 0x00, 0x12, 0x10]
}

pub fn h264_keyframe() -> Vec<u8> {
    vec![0x17, 0x01, 0, 0, 0, 0, 0, 0, 4, 0x65, 0x88, 0x84, 0x00]
}

pub fn aac_raw_frame() -> Vec<u8> {
    vec![0xAF, 0x01, 0x21, 0x10, 0x04]
}

/// Relay recording everything the server hands it
#[derive(Default)]
pub struct RecordingRelay {
    pub ready: Mutex<Vec<(String, Arc<MediaInfo>)>>,
    pub frames: Mutex<Vec<(String, Arc<Frame>)>>,
    pub ended: Mutex<Vec<String>>,
}

impl MediaRelay for RecordingRelay {
    fn on_stream_ready(&self, path: &str, _app: &str, _key: &str, media_info: Arc<MediaInfo>) -> bool {
        self.ready.lock().unwrap().push((path.to_string(), media_info));
        true
    }

    fn on_stream_data(&self, path: &str, frame: Arc<Frame>, _is_video: bool) -> bool {
        self.frames.lock().unwrap().push((path.to_string(), frame));
        true
    }

    fn on_stream_end(&self, path: &str) {
        self.ended.lock().unwrap().push(path.to_string());
    }
}

/// Start a server with a recording relay on an ephemeral loopback port
pub fn start_server(config: ServerConfig) -> (Arc<RtmpServer>, Arc<RecordingRelay>, SocketAddr) {
    let relay = Arc::new(RecordingRelay::default());
    let server = RtmpServer::with_relay(config, relay.clone());
    let addr = server.listen().expect("listen");
    (server, relay, addr)
}

/// Poll `condition` until it holds or the I/O timeout passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + IO_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Publishing client speaking just enough RTMP to push a stream
pub struct TestPublisher {
    stream: TcpStream,
    writer: ChunkWriter,
    reader: ChunkReader,
    pending: Vec<u8>,
}

impl TestPublisher {
    /// Connect and complete the handshake
    pub async fn connect(addr: SocketAddr) -> TestPublisher {
        let mut stream = TcpStream::connect(addr).await.expect("connect");

        let c0c1 = C0C1::create_client().encode().unwrap();
        stream.write_all(&c0c1).await.unwrap();

        let mut s0s1s2 = vec![0u8; 1 + HANDSHAKE_SIZE * 2];
        timeout(IO_TIMEOUT, stream.read_exact(&mut s0s1s2))
            .await
            .expect("handshake timed out")
            .unwrap();
        assert_eq!(s0s1s2[0], 3);
        stream.write_all(&create_c2(&s0s1s2[1..1 + HANDSHAKE_SIZE])).await.unwrap();

        TestPublisher {
            stream,
            writer: ChunkWriter::new(true, 128),
            reader: ChunkReader::new(),
            pending: Vec::new(),
        }
    }

    pub async fn send(&mut self, header: RtmpHeader, payload: &[u8]) {
        let bytes = self.writer.export(&header, payload).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    pub async fn send_command(&mut self, command: RtmpCommand, stream_id: u32) {
        let body = command.encode().unwrap();
        self.send(RtmpHeader::command(0, 0, stream_id), &body).await;
    }

    pub async fn send_video(&mut self, timestamp: u32, payload: &[u8]) {
        self.send(RtmpHeader::video(timestamp, 0, 1), payload).await;
    }

    pub async fn send_audio(&mut self, timestamp: u32, payload: &[u8]) {
        self.send(RtmpHeader::audio(timestamp, 0, 1), payload).await;
    }

    /// Next message from the server; panics on timeout or close
    pub async fn read_packet(&mut self) -> RtmpPacket {
        loop {
            if let Some(packet) = self.reader.pop_message() {
                if packet.message_type() == MSG_TYPE_SET_CHUNK_SIZE {
                    self.reader.set_chunk_size(read_control_u32(&packet.payload).unwrap() as usize);
                }
                return packet;
            }

            if !self.pending.is_empty() {
                let status = self.reader.import(&self.pending).unwrap();
                if status.consumed > 0 {
                    self.pending.drain(..status.consumed);
                    continue;
                }
            }

            let mut buf = [0u8; 4096];
            let n = timeout(IO_TIMEOUT, self.stream.read(&mut buf))
                .await
                .expect("read timed out")
                .unwrap();
            assert!(n > 0, "server closed the connection");
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Skip messages until a command named `name` arrives
    pub async fn read_command(&mut self, name: &str) -> RtmpCommand {
        loop {
            let packet = self.read_packet().await;
            if packet.message_type() != MSG_TYPE_COMMAND_AMF0 {
                continue;
            }
            let command = RtmpCommand::decode(&packet.payload).unwrap();
            if command.name == name {
                return command;
            }
        }
    }

    /// connect .. publish; returns the final `onStatus`
    pub async fn publish(&mut self, app: &str, key: &str) -> RtmpCommand {
        self.send_command(connect_command(app), 0).await;
        self.send_command(stream_name_command(CMD_RELEASE_STREAM, 2.0, key), 0)
            .await;
        self.send_command(stream_name_command(CMD_FC_PUBLISH, 3.0, key), 0).await;
        self.send_command(create_stream_command(4.0), 0).await;
        self.send_command(publish_command(key, app), 1).await;
        self.read_command(CMD_ON_STATUS).await
    }

    /// True once the server closed the socket
    pub async fn wait_closed(&mut self) -> bool {
        let mut buf = [0u8; 4096];
        loop {
            match timeout(IO_TIMEOUT, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

/// Status code carried by an `onStatus` reply
pub fn status_code(command: &RtmpCommand) -> Option<String> {
    command
        .argument(0)
        .and_then(|info| info.get_property("code"))
        .and_then(|code| code.as_string())
        .map(str::to_string)
}
