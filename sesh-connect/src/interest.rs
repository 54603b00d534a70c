use sesh_wire::Packet;

/// The routing key of an inbound `ssh-connection` packet, the
/// mux delivers each packet to the task registered for its key.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub(crate) enum Interest {
    GlobalRequest,
    GlobalResponse,

    ChannelOpen,
    ChannelOpenResponse(u32),

    ChannelWindowAdjust(u32),
    ChannelData(u32),
    ChannelExtendedData(u32),
    ChannelEof(u32),
    ChannelClose(u32),

    ChannelRequest(u32),
    ChannelResponse(u32),

    None,
}

/// All the channel-scoped messages carry the recipient channel
/// right after the message number.
fn recipient_channel(packet: &Packet) -> u32 {
    packet
        .payload
        .get(1..5)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_be_bytes)
        .unwrap_or_default()
}

impl From<&Packet> for Interest {
    fn from(packet: &Packet) -> Self {
        match packet.message_id() {
            Some(80) => Self::GlobalRequest,
            Some(81 | 82) => Self::GlobalResponse,
            Some(90) => Self::ChannelOpen,
            Some(91 | 92) => Self::ChannelOpenResponse(recipient_channel(packet)),
            Some(93) => Self::ChannelWindowAdjust(recipient_channel(packet)),
            Some(94) => Self::ChannelData(recipient_channel(packet)),
            Some(95) => Self::ChannelExtendedData(recipient_channel(packet)),
            Some(96) => Self::ChannelEof(recipient_channel(packet)),
            Some(97) => Self::ChannelClose(recipient_channel(packet)),
            Some(98) => Self::ChannelRequest(recipient_channel(packet)),
            Some(99 | 100) => Self::ChannelResponse(recipient_channel(packet)),
            _ => Self::None,
        }
    }
}
