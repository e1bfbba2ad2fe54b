use crate::protocol::constants::*;

/// Classification of a logical message by its type id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Protocol control messages
    Control(ControlType),

    /// User control event (stream begin, ping, ...)
    UserControl,

    Audio,

    Video,

    /// AMF0 command
    Command,

    /// AMF0 data (metadata)
    Data,

    /// AMF3 or shared-object variants, recognised but not handled
    Unsupported(u8),

    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    SetChunkSize,
    Abort,
    Acknowledgement,
    WindowAcknowledgement,
    SetPeerBandwidth,
}

impl MessageType {
    /// Create from message type ID
    pub fn from_id(id: u8) -> Self {
        match id {
            MSG_TYPE_SET_CHUNK_SIZE => MessageType::Control(ControlType::SetChunkSize),
            MSG_TYPE_ABORT => MessageType::Control(ControlType::Abort),
            MSG_TYPE_ACK => MessageType::Control(ControlType::Acknowledgement),
            MSG_TYPE_WINDOW_ACK => MessageType::Control(ControlType::WindowAcknowledgement),
            MSG_TYPE_SET_PEER_BW => MessageType::Control(ControlType::SetPeerBandwidth),
            MSG_TYPE_USER_CONTROL => MessageType::UserControl,
            MSG_TYPE_AUDIO => MessageType::Audio,
            MSG_TYPE_VIDEO => MessageType::Video,
            MSG_TYPE_COMMAND_AMF0 => MessageType::Command,
            MSG_TYPE_DATA_AMF0 => MessageType::Data,
            MSG_TYPE_DATA_AMF3
            | MSG_TYPE_COMMAND_AMF3
            | MSG_TYPE_SHARED_OBJECT_AMF0
            | MSG_TYPE_SHARED_OBJECT_AMF3
            | MSG_TYPE_AGGREGATE => MessageType::Unsupported(id),
            _ => MessageType::Unknown(id),
        }
    }

    /// Check if this is a control message
    pub fn is_control(&self) -> bool {
        matches!(self, MessageType::Control(_) | MessageType::UserControl)
    }

    /// Check if this is a media message (audio/video)
    pub fn is_media(&self) -> bool {
        matches!(self, MessageType::Audio | MessageType::Video)
    }
}
