//! Messages involved in the SSH's **transport** (`SSH-TRANS`) part of the protocol,
//! as defined in the [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253).

use binrw::binrw;

use crate::arch;

/// The `SSH_MSG_DISCONNECT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.1>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 1_u8)]
pub struct Disconnect {
    /// Reason for disconnection.
    pub reason: DisconnectReason,

    /// Description of the reason.
    pub description: arch::Utf8,

    /// Language tag.
    pub language: arch::Ascii,
}

/// The `reason` for disconnect in the `SSH_MSG_DISCONNECT` message.
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(big)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT`.
    #[brw(magic = 1_u32)]
    HostNotAllowedToConnect,

    /// `SSH_DISCONNECT_PROTOCOL_ERROR`.
    #[brw(magic = 2_u32)]
    ProtocolError,

    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
    #[brw(magic = 3_u32)]
    KeyExchangeFailed,

    /// `SSH_DISCONNECT_RESERVED`.
    #[brw(magic = 4_u32)]
    Reserved,

    /// `SSH_DISCONNECT_MAC_ERROR`.
    #[brw(magic = 5_u32)]
    MacError,

    /// `SSH_DISCONNECT_COMPRESSION_ERROR`.
    #[brw(magic = 6_u32)]
    CompressionError,

    /// `SSH_DISCONNECT_SERVICE_NOT_AVAILABLE`.
    #[brw(magic = 7_u32)]
    ServiceNotAvailable,

    /// `SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED`.
    #[brw(magic = 8_u32)]
    ProtocolVersionNotSupported,

    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`.
    #[brw(magic = 9_u32)]
    HostKeyNotVerifiable,

    /// `SSH_DISCONNECT_CONNECTION_LOST`.
    #[brw(magic = 10_u32)]
    ConnectionLost,

    /// `SSH_DISCONNECT_BY_APPLICATION`.
    #[brw(magic = 11_u32)]
    ByApplication,

    /// `SSH_DISCONNECT_TOO_MANY_CONNECTIONS`.
    #[brw(magic = 12_u32)]
    TooManyConnections,

    /// `SSH_DISCONNECT_AUTH_CANCELLED_BY_USER`.
    #[brw(magic = 13_u32)]
    AuthCancelledByUser,

    /// `SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE`.
    #[brw(magic = 14_u32)]
    NoMoreAuthMethodsAvailable,

    /// `SSH_DISCONNECT_ILLEGAL_USER_NAME`.
    #[brw(magic = 15_u32)]
    IllegalUserName,

    /// Any other disconnect reason, may be non-standard.
    ///
    /// The 'reason code' values in the range of `0xFE000000`
    /// through `0xFFFFFFFF` are reserved for PRIVATE USE.
    Other(u32),
}

/// The `SSH_MSG_IGNORE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.2>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 2_u8)]
pub struct Ignore {
    /// Discarded data.
    pub data: arch::Bytes,
}

/// The `SSH_MSG_UNIMPLEMENTED` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.4>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 3_u8)]
pub struct Unimplemented {
    /// Packet sequence number of the rejected message.
    pub seq: u32,
}

/// The `SSH_MSG_DEBUG` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-11.3>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 4_u8)]
pub struct Debug {
    /// Whether the message should be forcibly displayed.
    pub always_display: arch::Bool,

    /// The debug message.
    pub message: arch::Utf8,

    /// Language tag.
    pub language: arch::Ascii,
}

/// The `SSH_MSG_SERVICE_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-10>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 5_u8)]
pub struct ServiceRequest {
    /// The name of the requested service.
    pub service_name: arch::Ascii,
}

/// The `SSH_MSG_SERVICE_ACCEPT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-10>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 6_u8)]
pub struct ServiceAccept {
    /// The name of the accepted service.
    pub service_name: arch::Ascii,
}

/// The `SSH_MSG_KEXINIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.1>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 20_u8)]
pub struct KexInit {
    /// Random bytes to mix into the exchange hash.
    pub cookie: [u8; 16],

    /// Supported _key-exchange_ algorithms, most preferred first.
    pub kex_algorithms: arch::NameList,

    /// Supported _server host key_ algorithms, most preferred first.
    pub server_host_key_algorithms: arch::NameList,

    /// Supported _encryption_ algorithms, client to server.
    pub encryption_algorithms_client_to_server: arch::NameList,

    /// Supported _encryption_ algorithms, server to client.
    pub encryption_algorithms_server_to_client: arch::NameList,

    /// Supported _mac_ algorithms, client to server.
    pub mac_algorithms_client_to_server: arch::NameList,

    /// Supported _mac_ algorithms, server to client.
    pub mac_algorithms_server_to_client: arch::NameList,

    /// Supported _compression_ algorithms, client to server.
    pub compression_algorithms_client_to_server: arch::NameList,

    /// Supported _compression_ algorithms, server to client.
    pub compression_algorithms_server_to_client: arch::NameList,

    /// Preferred _languages_, client to server.
    pub languages_client_to_server: arch::NameList,

    /// Preferred _languages_, server to client.
    pub languages_server_to_client: arch::NameList,

    /// Whether a guessed key-exchange packet follows.
    pub first_kex_packet_follows: arch::Bool,

    #[bw(calc = 0)]
    _reserved: u32,
}

/// The `SSH_MSG_NEWKEYS` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.3>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 21_u8)]
pub struct NewKeys;

/// The `SSH_MSG_KEXDH_INIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 30_u8)]
pub struct KexDhInit {
    /// The client's ephemeral public value `e`.
    pub e: arch::MpInt,
}

/// The `SSH_MSG_KEXDH_REPLY` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 31_u8)]
pub struct KexDhReply {
    /// The server's public host key blob.
    pub k_s: arch::Bytes,

    /// The server's ephemeral public value `f`.
    pub f: arch::MpInt,

    /// The signature of the exchange hash with the host key.
    pub signature: arch::Bytes,
}

/// The `SSH_MSG_KEX_ECDH_INIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 30_u8)]
pub struct KexEcdhInit {
    /// The client's ephemeral public key octet string.
    pub q_c: arch::Bytes,
}

/// The `SSH_MSG_KEX_ECDH_REPLY` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 31_u8)]
pub struct KexEcdhReply {
    /// The server's public host key blob.
    pub k_s: arch::Bytes,

    /// The server's ephemeral public key octet string.
    pub q_s: arch::Bytes,

    /// The signature of the exchange hash with the host key.
    pub signature: arch::Bytes,
}

/// The `SSH_MSG_KEX_DH_GEX_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-5>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 34_u8)]
pub struct KexDhGexRequest {
    /// Minimal acceptable group size, in bits.
    pub min: u32,

    /// Preferred group size, in bits.
    pub n: u32,

    /// Maximal acceptable group size, in bits.
    pub max: u32,
}

/// The `SSH_MSG_KEX_DH_GEX_GROUP` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-5>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 31_u8)]
pub struct KexDhGexGroup {
    /// The safe prime of the selected group.
    pub p: arch::MpInt,

    /// The generator for the subgroup.
    pub g: arch::MpInt,
}

/// The `SSH_MSG_KEX_DH_GEX_INIT` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-5>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 32_u8)]
pub struct KexDhGexInit {
    /// The client's ephemeral public value `e`.
    pub e: arch::MpInt,
}

/// The `SSH_MSG_KEX_DH_GEX_REPLY` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-5>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 33_u8)]
pub struct KexDhGexReply {
    /// The server's public host key blob.
    pub k_s: arch::Bytes,

    /// The server's ephemeral public value `f`.
    pub f: arch::MpInt,

    /// The signature of the exchange hash with the host key.
    pub signature: arch::Bytes,
}
