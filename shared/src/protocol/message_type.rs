/// The wire tags a batch payload may carry after its header.
///
/// `Batch` and `Transfer` are reserved by the tag table; no current send
/// path emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Batch = 0,
    Transfer = 1,
    /// Latency probe; the peer answers with a `Pong`.
    Ping = 2,
    /// Answer to a `Ping`.
    Pong = 3,
    /// Per-entity data records until the end of the batch.
    UpdateEntities = 4,
    /// A chunk of up to 65535 removed entity ids.
    RemoveEntities = 5,
}

impl MessageType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Batch),
            1 => Some(Self::Transfer),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::UpdateEntities),
            5 => Some(Self::RemoveEntities),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_tags() {
        for tag in 0..=5u8 {
            let message_type = MessageType::from_u8(tag).unwrap();
            assert_eq!(message_type as u8, tag);
        }
        assert_eq!(MessageType::from_u8(6), None);
        assert_eq!(MessageType::from_u8(0xFF), None);
    }
}
