//! Remote pseudo-terminal settings.
//!
//! The [`PtyRequest`] is built once before the session starts and applied in
//! a single `pty-req` before the shell is launched.

use russh::Pty;

use super::config;

/// Baud rate advertised for both terminal directions
pub(crate) const DEFAULT_SPEED: u32 = 14400;

/// Terminal flags applied with the PTY request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalModes {
    pub echo: bool,
    pub input_speed: u32,
    pub output_speed: u32,
}

impl Default for TerminalModes {
    /// Echo disabled, 14.4 kbaud in both directions.
    fn default() -> Self {
        Self {
            echo: false,
            input_speed: DEFAULT_SPEED,
            output_speed: DEFAULT_SPEED,
        }
    }
}

impl TerminalModes {
    /// Encode as SSH terminal mode opcodes.
    pub fn to_modes(&self) -> Vec<(Pty, u32)> {
        vec![
            (Pty::ECHO, u32::from(self.echo)),
            (Pty::TTY_OP_ISPEED, self.input_speed),
            (Pty::TTY_OP_OSPEED, self.output_speed),
        ]
    }
}

/// Everything needed for one `pty-req`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub columns: u32,
    pub rows: u32,
    pub modes: TerminalModes,
}

impl PtyRequest {
    pub fn new(term: impl Into<String>, columns: u32, rows: u32) -> Self {
        Self {
            term: term.into(),
            columns,
            rows,
            modes: TerminalModes::default(),
        }
    }

    /// Build the request from configuration (`CODESPACE_TERM`, `COLUMNS`, `LINES`).
    pub fn from_env() -> Self {
        let (columns, rows) = config::resolve_geometry(None, None);
        Self::new(config::resolve_term(None), columns, rows)
    }

    pub fn with_modes(mut self, modes: TerminalModes) -> Self {
        self.modes = modes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes_disable_echo() {
        let modes = TerminalModes::default();
        assert!(!modes.echo);
        assert_eq!(modes.input_speed, 14400);
        assert_eq!(modes.output_speed, 14400);
    }

    #[test]
    fn test_modes_encoding() {
        let encoded = TerminalModes::default().to_modes();
        assert_eq!(
            encoded,
            vec![
                (Pty::ECHO, 0),
                (Pty::TTY_OP_ISPEED, 14400),
                (Pty::TTY_OP_OSPEED, 14400),
            ]
        );
    }

    #[test]
    fn test_echo_enabled_encodes_one() {
        let modes = TerminalModes {
            echo: true,
            ..TerminalModes::default()
        };
        assert_eq!(modes.to_modes()[0], (Pty::ECHO, 1));
    }

    #[test]
    fn test_new_request_uses_default_modes() {
        let request = PtyRequest::new("xterm", 80, 40);
        assert_eq!(request.term, "xterm");
        assert_eq!((request.columns, request.rows), (80, 40));
        assert_eq!(request.modes, TerminalModes::default());
    }

    #[test]
    fn test_with_modes_overrides() {
        let modes = TerminalModes {
            echo: true,
            input_speed: 9600,
            output_speed: 9600,
        };
        let request = PtyRequest::new("vt100", 120, 30).with_modes(modes);
        assert_eq!(request.modes, modes);
    }
}
