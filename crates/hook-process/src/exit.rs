//! Resultado observado al salir un proceso y clasificación de crash.
use std::io;
use std::process::ExitStatus;

/// Snapshot inmutable tomado cuando se observa la salida del proceso.
///
/// Los flags intencionales sólo existen aquí: antes de la salida no hay
/// `ExitReport` y por lo tanto ambos se leen como `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub killed_intentionally: bool,
    pub terminated_intentionally: bool,
}

/// Notificación de crash: el proceso murió sin que se lo pidiéramos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashReport {
    /// Código de salida, `None` cuando murió por señal.
    pub exit_code: Option<i32>,
    /// `true` si lo mató SIGKILL (o equivalente) desde afuera.
    pub killed: bool,
}

impl ExitReport {
    pub(crate) fn from_wait(status: io::Result<ExitStatus>, killed: bool, terminated: bool) -> Self {
        let (code, signal) = match status {
            Ok(status) => (status.code(), exit_signal(&status)),
            Err(_) => (None, None),
        };
        Self { code,
               signal,
               killed_intentionally: killed,
               terminated_intentionally: terminated }
    }

    pub fn crash(&self) -> Option<CrashReport> {
        if self.killed_intentionally || self.terminated_intentionally {
            return None;
        }
        if self.signal.is_some_and(is_kill_signal) {
            return Some(CrashReport { exit_code: None, killed: true });
        }
        match self.code {
            Some(0) => None,
            code => Some(CrashReport { exit_code: code, killed: false }),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn is_kill_signal(signal: i32) -> bool {
    signal == libc::SIGKILL
}

#[cfg(not(unix))]
fn is_kill_signal(_signal: i32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(code: Option<i32>, signal: Option<i32>) -> ExitReport {
        ExitReport { code, signal, ..ExitReport::default() }
    }

    #[test]
    fn non_zero_exit_is_a_crash_with_status() {
        let crash = report(Some(3), None).crash().expect("crash esperado");
        assert_eq!(crash, CrashReport { exit_code: Some(3), killed: false });
    }

    #[test]
    fn clean_exit_is_not_a_crash() {
        assert!(report(Some(0), None).crash().is_none());
        assert!(report(Some(0), None).success());
    }

    #[test]
    fn intentional_flags_suppress_crash() {
        let killed = ExitReport { killed_intentionally: true, ..report(None, Some(9)) };
        let termed = ExitReport { terminated_intentionally: true, ..report(Some(1), None) };
        assert!(killed.crash().is_none());
        assert!(termed.crash().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn external_sigkill_is_reported_as_killed() {
        let crash = report(None, Some(libc::SIGKILL)).crash().expect("crash esperado");
        assert_eq!(crash, CrashReport { exit_code: None, killed: true });
    }

    #[cfg(unix)]
    #[test]
    fn other_signals_crash_without_killed_flag() {
        let crash = report(None, Some(libc::SIGTERM)).crash().expect("crash esperado");
        assert_eq!(crash, CrashReport { exit_code: None, killed: false });
    }
}
