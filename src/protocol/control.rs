use crate::protocol::constants::*;
use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::{Error, Result};

fn control_packet(message_type: u8, payload: Vec<u8>) -> RtmpPacket {
    RtmpPacket::new(RtmpHeader::control(message_type, 0), payload)
}

pub fn create_chunk_size_packet(size: u32) -> RtmpPacket {
    control_packet(MSG_TYPE_SET_CHUNK_SIZE, (size & MAX_CHUNK_SIZE).to_be_bytes().to_vec())
}

/// Acknowledgement carrying the number of bytes received so far
pub fn create_ack_packet(sequence: u32) -> RtmpPacket {
    control_packet(MSG_TYPE_ACK, sequence.to_be_bytes().to_vec())
}

pub fn create_window_ack_packet(size: u32) -> RtmpPacket {
    control_packet(MSG_TYPE_WINDOW_ACK, size.to_be_bytes().to_vec())
}

pub fn create_peer_bandwidth_packet(size: u32, limit_type: u8) -> RtmpPacket {
    let mut payload = size.to_be_bytes().to_vec();
    payload.push(limit_type);
    control_packet(MSG_TYPE_SET_PEER_BW, payload)
}

/// User control message: u16 event type followed by event data
pub fn create_user_control_packet(event: u16, data: &[u8]) -> RtmpPacket {
    let mut payload = Vec::with_capacity(2 + data.len());
    payload.extend_from_slice(&event.to_be_bytes());
    payload.extend_from_slice(data);
    control_packet(MSG_TYPE_USER_CONTROL, payload)
}

pub fn create_stream_begin_packet(stream_id: u32) -> RtmpPacket {
    create_user_control_packet(USER_CONTROL_STREAM_BEGIN, &stream_id.to_be_bytes())
}

/// First four payload bytes as a big-endian u32 (chunk size, window, ack)
pub fn read_control_u32(payload: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = payload
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::protocol(format!("Control payload too short: {} bytes", payload.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_begin_layout() {
        let packet = create_stream_begin_packet(1);
        assert_eq!(packet.header.message_type, MSG_TYPE_USER_CONTROL);
        assert_eq!(packet.header.chunk_stream_id, CHUNK_STREAM_PROTOCOL);
        assert_eq!(packet.payload, vec![0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_peer_bandwidth_layout() {
        let packet = create_peer_bandwidth_packet(2_500_000, PEER_BW_LIMIT_DYNAMIC);
        assert_eq!(packet.header.message_length, 5);
        assert_eq!(read_control_u32(&packet.payload).unwrap(), 2_500_000);
        assert_eq!(packet.payload[4], 2);
    }

    #[test]
    fn test_chunk_size_masks_high_bit() {
        let packet = create_chunk_size_packet(0xFFFF_FFFF);
        assert_eq!(read_control_u32(&packet.payload).unwrap(), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_short_control_payload() {
        assert!(read_control_u32(&[0, 1, 2]).is_err());
    }
}
