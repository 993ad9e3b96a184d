use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Failure classes of the probe and boot sequences.
///
/// None of these are recovered locally; each names the phase that failed and
/// carries the system-level cause, and each maps to its own process exit code
/// so a caller can tell the phases apart.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to open device \"{path}\": {source}")]
    DeviceUnavailable { path: String, source: io::Error },

    #[error("failed to configure short transfers: {0}")]
    ConfigurationFailed(Errno),

    #[error("failed to send command: {0}")]
    WriteFailed(io::Error),

    #[error("failed to read response: {0}")]
    ReadFailed(io::Error),

    #[error("failed to read boot image \"{path}\": {source}")]
    ImageUnreadable { path: String, source: io::Error },

    #[error("unexpected notice {0:#010x} from what should be the second stage bootloader")]
    UnexpectedNotice(u32),
}

impl ProbeError {
    /// Process exit status identifying the failed phase.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::DeviceUnavailable { .. } => 1,
            ProbeError::ConfigurationFailed(_) => 2,
            ProbeError::WriteFailed(_) => 3,
            ProbeError::ReadFailed(_) => 4,
            ProbeError::ImageUnreadable { .. } => 5,
            ProbeError::UnexpectedNotice(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "No such file or directory")
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ProbeError::DeviceUnavailable {
                path: "/dev/ugen0.01".to_string(),
                source: not_found(),
            },
            ProbeError::ConfigurationFailed(Errno::EINVAL),
            ProbeError::WriteFailed(not_found()),
            ProbeError::ReadFailed(not_found()),
            ProbeError::ImageUnreadable {
                path: "x-loader.bin".to_string(),
                source: not_found(),
            },
            ProbeError::UnexpectedNotice(0xDEADBEEF),
        ];
        let mut codes = errors.iter().map(|e| e.exit_code()).collect::<Vec<_>>();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_messages_name_the_failed_phase() {
        let e = ProbeError::DeviceUnavailable {
            path: "/dev/ugen0.01".to_string(),
            source: not_found(),
        };
        assert_eq!(
            e.to_string(),
            "failed to open device \"/dev/ugen0.01\": No such file or directory"
        );

        let e = ProbeError::UnexpectedNotice(0xDEADBEEF);
        assert_eq!(
            e.to_string(),
            "unexpected notice 0xdeadbeef from what should be the second stage bootloader"
        );
    }
}
