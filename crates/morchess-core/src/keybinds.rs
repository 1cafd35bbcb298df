use crossterm::event::{KeyEvent, KeyModifiers};

/// Editor input modes, modeled after vim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Navigation, operators and motions.
    #[default]
    Normal,
    /// Text input. Entered with `i`, `a`, `A`, `o`, `O`, `cc`... Exited with `Esc`.
    Edit,
    /// Command line. Entered with `:`. `:w` saves, the rest goes to the host.
    Command,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Edit => "EDIT",
            Self::Command => "COMMAND",
        }
    }
}

/// Whether the control modifier is held.
pub fn is_ctrl(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Characters that edit mode inserts verbatim: `[A-Za-z0-9 .=!_]`.
pub fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '=' | '!' | '_')
}

/// Characters accepted on the `:` command line.
pub fn is_command_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}
