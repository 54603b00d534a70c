//! Messages involved in the SSH's **authentication** (`SSH-USERAUTH`) part of the protocol,
//! as defined in the [RFC 4252](https://datatracker.ietf.org/doc/html/rfc4252)
//! and [RFC 4256](https://datatracker.ietf.org/doc/html/rfc4256).

use binrw::binrw;

use crate::arch;

/// The `SSH_MSG_USERAUTH_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 50_u8)]
pub struct Request {
    /// Username for the auth request.
    pub username: arch::Utf8,

    /// Service name to start after authentication.
    pub service_name: arch::Ascii,

    #[bw(calc = arch::Ascii::new(method.as_str()))]
    auth_method: arch::Ascii,

    /// Authentication method used.
    #[br(args(&auth_method))]
    pub method: Method,
}

/// The authentication method in the `SSH_MSG_USERAUTH_REQUEST` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
#[br(import(method: &str))]
pub enum Method {
    /// Authenticate using the `none` method,
    /// as defined in [RFC4252 section 5.2](https://datatracker.ietf.org/doc/html/rfc4252#section-5.2).
    #[br(pre_assert(method == Method::NONE))]
    None,

    /// Authenticate using the `publickey` method,
    /// as defined in [RFC4252 section 7](https://datatracker.ietf.org/doc/html/rfc4252#section-7).
    #[br(pre_assert(method == Method::PUBLICKEY))]
    Publickey {
        #[bw(calc = arch::Bool(signature.is_some()))]
        signed: arch::Bool,

        /// Public key algorithm's name.
        algorithm: arch::Bytes,

        /// Public key blob.
        blob: arch::Bytes,

        /// The signature over the session identifier and the request,
        /// present only on the second, committed request.
        #[br(if(*signed))]
        signature: Option<arch::Bytes>,
    },

    /// Authenticate using the `password` method,
    /// as defined in [RFC4252 section 8](https://datatracker.ietf.org/doc/html/rfc4252#section-8).
    #[br(pre_assert(method == Method::PASSWORD))]
    Password {
        #[bw(calc = arch::Bool(new.is_some()))]
        change: arch::Bool,

        /// Plaintext password.
        password: arch::Utf8,

        /// After a `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ`,
        /// the new password to be set in place of the old one.
        #[br(if(*change))]
        new: Option<arch::Utf8>,
    },

    /// Authenticate using the `hostbased` method,
    /// as defined in [RFC4252 section 9](https://datatracker.ietf.org/doc/html/rfc4252#section-9).
    #[br(pre_assert(method == Method::HOSTBASED))]
    Hostbased {
        /// Public key algorithm for the host key.
        algorithm: arch::Bytes,

        /// Public host key and certificates for the client host.
        host_key: arch::Bytes,

        /// Client host name expressed as the FQDN.
        client_fqdn: arch::Ascii,

        /// Username on the client host.
        username: arch::Utf8,

        /// The signature of the authentication packet.
        signature: arch::Bytes,
    },

    /// Authenticate using the `keyboard-interactive` method,
    /// as defined in [RFC4256 section 3.1](https://datatracker.ietf.org/doc/html/rfc4256#section-3.1).
    #[br(pre_assert(method == Method::KEYBOARD_INTERACTIVE))]
    KeyboardInteractive {
        /// Language tag.
        language: arch::Ascii,

        /// A hint for the preferred interactive submethods.
        submethods: arch::Utf8,
    },
}

impl Method {
    const NONE: &'static str = "none";
    const PUBLICKEY: &'static str = "publickey";
    const PASSWORD: &'static str = "password";
    const HOSTBASED: &'static str = "hostbased";
    const KEYBOARD_INTERACTIVE: &'static str = "keyboard-interactive";

    /// Get the [`Method`]'s SSH identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None { .. } => Self::NONE,
            Self::Publickey { .. } => Self::PUBLICKEY,
            Self::Password { .. } => Self::PASSWORD,
            Self::Hostbased { .. } => Self::HOSTBASED,
            Self::KeyboardInteractive { .. } => Self::KEYBOARD_INTERACTIVE,
        }
    }
}

/// The `SSH_MSG_USERAUTH_FAILURE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.1>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 51_u8)]
pub struct Failure {
    /// Authentication methods able to continue the exchange.
    pub continue_with: arch::NameList,

    /// Whether the rejected attempt was itself successful.
    pub partial_success: arch::Bool,
}

/// The `SSH_MSG_USERAUTH_SUCCESS` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.1>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 52_u8)]
pub struct Success;

/// The `SSH_MSG_USERAUTH_BANNER` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-5.4>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 53_u8)]
pub struct Banner {
    /// The banner message to display.
    pub message: arch::Utf8,

    /// Language tag.
    pub language: arch::Ascii,
}

/// The `SSH_MSG_USERAUTH_PK_OK` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-7>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 60_u8)]
pub struct PkOk {
    /// Public key algorithm name from the probing request.
    pub algorithm: arch::Bytes,

    /// Public key blob from the probing request.
    pub blob: arch::Bytes,
}

/// The `SSH_MSG_USERAUTH_PASSWD_CHANGEREQ` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4252#section-8>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 60_u8)]
pub struct PasswdChangereq {
    /// Password change prompt.
    pub prompt: arch::Utf8,

    /// Language tag (deprecated).
    pub language: arch::Ascii,
}

/// The `SSH_MSG_USERAUTH_INFO_REQUEST` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4256#section-3.2>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 60_u8)]
pub struct InfoRequest {
    /// Name of the challenge.
    pub name: arch::Utf8,

    /// Instructions for the challenge.
    pub instruction: arch::Utf8,

    /// Language tag (deprecated).
    pub language: arch::Ascii,

    #[bw(calc = prompts.len() as u32)]
    num_prompts: u32,

    /// The challenge's prompts.
    #[br(count = num_prompts)]
    pub prompts: Vec<InfoRequestPrompt>,
}

/// A prompt in the `SSH_MSG_USERAUTH_INFO_REQUEST` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
pub struct InfoRequestPrompt {
    /// Challenge prompt text.
    pub prompt: arch::Utf8,

    /// Whether the client should echo back typed characters.
    pub echo: arch::Bool,
}

/// The `SSH_MSG_USERAUTH_INFO_RESPONSE` message.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4256#section-3.4>.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 61_u8)]
pub struct InfoResponse {
    #[bw(calc = responses.len() as u32)]
    num_responses: u32,

    /// Responses to the provided challenge, one per prompt.
    #[br(count = num_responses)]
    pub responses: Vec<arch::Utf8>,
}
