use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two stable paths the switcher manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Interpreter,
    Server,
}

impl LinkKind {
    /// Relink order: interpreter first, then server.
    pub const ALL: [LinkKind; 2] = [LinkKind::Interpreter, LinkKind::Server];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interpreter => "interpreter",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkSelection {
    #[default]
    Both,
    InterpreterOnly,
    ServerOnly,
}

impl LinkSelection {
    pub fn includes(self, kind: LinkKind) -> bool {
        match self {
            Self::Both => true,
            Self::InterpreterOnly => kind == LinkKind::Interpreter,
            Self::ServerOnly => kind == LinkKind::Server,
        }
    }
}
