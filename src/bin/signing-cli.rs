use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::path::PathBuf;
use std::process::ExitCode;

use settlement_proxy::keys::StaticKeys;
use settlement_proxy::signing::identity::{decode_signing_key, decode_verifying_key};
use settlement_proxy::signing::{
    issue_token, signing_string, unix_now, SignatureHeader, SignatureMode, Signer, SigningIdentity,
    Verification, VerificationPolicy, Verifier,
};

#[derive(Parser)]
#[command(name = "signing-cli")]
#[command(about = "Key and signature tooling for the settlement proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 key pair
    Keygen,
    /// Print the Authorization header for a body
    Sign {
        #[arg(long)]
        subscriber_id: String,
        #[arg(long)]
        key_id: String,
        /// Base64 private key (32-byte seed or 64-byte keypair)
        #[arg(long, env = "SIGNING_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        /// File holding the exact body bytes
        #[arg(long)]
        body: PathBuf,
        /// Epoch seconds; defaults to now
        #[arg(long)]
        created: Option<u64>,
    },
    /// Check an Authorization header against a body and public key
    Verify {
        #[arg(long)]
        header: String,
        #[arg(long)]
        body: PathBuf,
        /// Base64 public key of the signer
        #[arg(long)]
        public_key: String,
        /// Also enforce the created/expires window against the current time
        #[arg(long)]
        enforce_window: bool,
    },
    /// Print the hex x-signature token for an internal caller
    CallerToken {
        #[arg(long)]
        subscriber_id: String,
        #[arg(long)]
        subscriber_uri: String,
        #[arg(long, env = "CALLER_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },
    /// Print the canonical signing string for a body
    SigningString {
        #[arg(long)]
        body: PathBuf,
        #[arg(long)]
        created: u64,
        #[arg(long)]
        expires: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Commands::Keygen => {
            let key = SigningKey::generate(&mut OsRng);
            println!("private_key (seed):    {}", STANDARD.encode(key.to_bytes()));
            println!("private_key (keypair): {}", STANDARD.encode(key.to_keypair_bytes()));
            println!("public_key:            {}", STANDARD.encode(key.verifying_key().to_bytes()));
        }
        Commands::Sign { subscriber_id, key_id, private_key, body, created } => {
            let identity = SigningIdentity::from_base64(subscriber_id, key_id, &private_key)?;
            let body = std::fs::read(body)?;
            let header = Signer::new(identity)
                .authorization(&body, created.unwrap_or_else(unix_now), SignatureMode::Valid)
                .ok_or("signer produced no header")?;
            println!("{}", header);
        }
        Commands::Verify { header, body, public_key, enforce_window } => {
            let parsed = SignatureHeader::parse(&header).ok_or("header does not parse")?;
            let key = decode_verifying_key(&public_key)?;
            let body = std::fs::read(body)?;

            let resolver = StaticKeys::default().with(
                &parsed.key_id.subscriber_id,
                &parsed.key_id.unique_key_id,
                key,
            );
            let policy = VerificationPolicy {
                enforce_window,
                ..Default::default()
            };
            match Verifier::new(std::sync::Arc::new(resolver), policy)
                .verify(&parsed, &body, unix_now())
                .await
            {
                Ok(Verification::Verified) | Ok(Verification::TrustedBypass) => {
                    println!("valid: {}", parsed.key_id);
                }
                Err(e) => {
                    println!("invalid: {}", e);
                    return Ok(false);
                }
            }
        }
        Commands::CallerToken { subscriber_id, subscriber_uri, private_key } => {
            let key = decode_signing_key(&private_key)?;
            println!("{}", issue_token(&key, &subscriber_id, &subscriber_uri));
        }
        Commands::SigningString { body, created, expires } => {
            let body = std::fs::read(body)?;
            println!("{}", signing_string(&body, created, expires));
        }
    }
    Ok(true)
}
