pub use ssh_key::Algorithm as Key;
use sesh_wire::trans::KexInit;

use crate::{Error, Result};

/// Pick the host key algorithm from the two `SSH_MSG_KEXINIT` messages:
/// the first entry of the client's list that also appears in the server's.
pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<Key> {
    clientkex
        .server_host_key_algorithms
        .preferred_in(&serverkex.server_host_key_algorithms)
        .ok_or(Error::NoCommonKey)?
        .parse()
        .map_err(|_| Error::NoCommonKey)
}
