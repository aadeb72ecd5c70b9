use std::fmt;

/// Commands understood on the server-to-server protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Replace the updatable fields of a stored license
    UpdateLicense,
    /// Register an encrypted publication
    CreateContent,
    /// Sent to the companion status server after a license is issued
    UpdateLicenseStatus,
}

impl Command {
    pub const ALL: [Command; 3] = [
        Command::UpdateLicense,
        Command::CreateContent,
        Command::UpdateLicenseStatus,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn token(self) -> &'static str {
        match self {
            Command::UpdateLicense => "UPDATELICENSE",
            Command::CreateContent => "CREATECONTENT",
            Command::UpdateLicenseStatus => "UPDATELICENSESTATUS",
        }
    }

    /// Exact, case-sensitive token match.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.token() == token)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
