// Message types
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_SHARED_OBJECT_AMF3: u8 = 16;
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_SHARED_OBJECT_AMF0: u8 = 19;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;

// Chunk stream IDs (0 and 1 are basic-header escapes)
pub const CHUNK_STREAM_MIN: u32 = 2;
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_VIDEO: u32 = 6;
pub const CHUNK_STREAM_DATA: u32 = 8;
pub const CHUNK_STREAM_MAX: u32 = 65599;

// User control event types
pub const USER_CONTROL_STREAM_BEGIN: u16 = 0;
pub const USER_CONTROL_STREAM_EOF: u16 = 1;
pub const USER_CONTROL_STREAM_DRY: u16 = 2;
pub const USER_CONTROL_SET_BUFFER_LENGTH: u16 = 3;
pub const USER_CONTROL_STREAM_IS_RECORDED: u16 = 4;
pub const USER_CONTROL_PING_REQUEST: u16 = 6;
pub const USER_CONTROL_PING_RESPONSE: u16 = 7;

// Set peer bandwidth limit types
pub const PEER_BW_LIMIT_HARD: u8 = 0;
pub const PEER_BW_LIMIT_SOFT: u8 = 1;
pub const PEER_BW_LIMIT_DYNAMIC: u8 = 2;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_WINDOW_SIZE: u32 = 2_500_000;
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;
pub const DEFAULT_CLIENT_ID: f64 = 12345.0;
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

/// Largest body a 24-bit message length can declare
pub const MAX_MESSAGE_LENGTH: usize = 0x00FF_FFFF;

/// Upper bound for one receive buffer or one declared message body.
/// Above `MAX_MESSAGE_LENGTH`, so on its own it only bounds receive buffers.
pub const MAX_PACKET_SIZE: usize = 20 * 1024 * 1024;

/// 24-bit timestamp sentinel announcing a 4-byte extended timestamp
pub const EXTENDED_TIMESTAMP: u32 = 0x00FF_FFFF;

/// control(1) + packet type(1) + composition time(3)
pub const VIDEO_DATA_MIN_SIZE: usize = 5;
/// control(1) + packet type(1)
pub const AUDIO_DATA_MIN_SIZE: usize = 2;

pub const VIDEO_CODEC_AVC: u8 = 7;
pub const SOUND_FORMAT_AAC: u8 = 10;

// Command names
pub const CMD_CONNECT: &str = "connect";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_FC_PUBLISH: &str = "FCPublish";
pub const CMD_FC_UNPUBLISH: &str = "FCUnpublish";
pub const CMD_ON_FC_PUBLISH: &str = "onFCPublish";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_DELETE_STREAM: &str = "deleteStream";
pub const CMD_PING: &str = "ping";
pub const CMD_RESULT: &str = "_result";
pub const CMD_ERROR: &str = "_error";
pub const CMD_ON_STATUS: &str = "onStatus";

// Data message names
pub const DATA_SET_DATA_FRAME: &str = "@setDataFrame";
pub const DATA_ON_METADATA: &str = "onMetaData";

// Status levels and codes
pub const LEVEL_STATUS: &str = "status";
pub const LEVEL_ERROR: &str = "error";
pub const CODE_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
pub const CODE_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const CODE_PUBLISH_REJECTED: &str = "NetStream.Publish.Rejected";

// Server identity announced in the connect result
pub const FMS_VERSION: &str = "FMS/3,5,2,654";
pub const FMS_DATA_VERSION: &str = "3,5,2,654";
pub const FMS_CAPABILITIES: f64 = 31.0;
