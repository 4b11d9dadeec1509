use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gatekeep-admin")]
#[command(about = "Gatekeep checkpoint administration")]
pub struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://gatekeep.db")]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Device enrollment tokens
    Enrollment {
        #[command(subcommand)]
        enrollment_cmd: EnrollmentCommand,
    },
    /// Organization signing keys
    Keys {
        #[command(subcommand)]
        keys_cmd: KeysCommand,
    },
    /// Print the signed QR for a visitor authorization
    SignQr {
        /// Authorization ID
        authorization_id: String,
    },
    /// Authorizations revoked since an instant (full list when omitted)
    RevokedSince {
        /// Organization ID
        organization_id: String,

        /// RFC 3339 instant, normally the previous response's serverTime
        #[arg(long)]
        since: Option<String>,
    },
    /// Verify a signed QR the way an enrolled device does, without the database
    VerifyOffline {
        /// Signed QR text
        qr: String,

        /// Enrollment bundle JSON
        #[arg(long)]
        bundle: PathBuf,

        /// Denylist JSON kept by the device
        #[arg(long)]
        denylist: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum EnrollmentCommand {
    /// Mint the first enrollment URL for an operator account
    Issue {
        /// Operator user ID
        user_id: String,

        /// Administrator issuing the URL
        #[arg(long)]
        actor: Option<String>,
    },
    /// Replace an operator's enrollment URL, revoking pending ones
    Regenerate {
        /// Operator user ID
        user_id: String,

        /// Administrator issuing the URL
        #[arg(long)]
        actor: Option<String>,
    },
    /// Show what a raw token would enroll, without consuming it.
    /// The token is read from GATEKEEP_ENROLLMENT_TOKEN, or from stdin
    Preview,
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Show the active public key as a JWK
    Show {
        /// Organization ID
        organization_id: String,

        /// Generate the key if the organization has none yet
        #[arg(long)]
        create: bool,
    },
}
