//! Envío de la señal cooperativa según plataforma.
use std::io;

/// SIGTERM vía `kill(2)`. Un proceso ya inexistente (`ESRCH`) no es error.
#[cfg(unix)]
pub(crate) fn send_term(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) no toca memoria; sólo envía la señal al pid indicado.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Sin señales POSIX: convención de escribir ETX (0x03) en stdin, que un
/// handler bien portado interpreta como "por favor salí".
#[cfg(not(unix))]
pub(crate) const TERM_CONTROL_CHAR: u8 = 0x03;
