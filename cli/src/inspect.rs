//! Token inspection
//!
//! Verifies a token with the deployment's key material and prints the decoded
//! call stack and pending action as JSON.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::Args;
use waystack_core::{AeadCipher, Codec, GlobalKey, SessionKeys, SignedEnvelope, Signer, Transfer};
use waystack_runtime::transport::{STORED_ID_LEN, decode_wire_token};

#[derive(Args)]
pub struct InspectArgs {
    /// Token as found in the `wst` parameter
    pub token: String,

    /// Environment variable holding the signing secret
    #[arg(long, default_value = "WAYSTACK_SECRET")]
    pub key_env: String,

    /// Session id, for deployments using per-session keys
    #[arg(long)]
    pub session: Option<String>,

    /// Environment variable holding the base64url cipher key, when tokens are encrypted
    #[arg(long)]
    pub cipher_key_env: Option<String>,

    /// Look up database-backed tokens in this store
    #[arg(long, env = "WAYSTACK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Decode without checking the tag (unencrypted tokens only)
    #[arg(long)]
    pub no_verify: bool,
}

pub async fn run_inspect_command(args: InspectArgs) -> Result<()> {
    let envelope = load_envelope(&args).await?;

    let payload = if args.no_verify {
        if args.cipher_key_env.is_some() {
            bail!("--no-verify cannot decrypt; drop --cipher-key-env or verify the token");
        }
        eprintln!("warning: tag not verified");
        envelope.payload
    } else {
        signer(&args)?
            .open(&envelope, args.session.as_deref())
            .context("token failed verification")?
    };

    let transfer: Transfer = Codec::default()
        .decode_transfer(&payload)
        .context("token verified but did not decode")?;

    eprintln!(
        "depth {} | top view `{}` | action {}",
        transfer.stack.len(),
        transfer.stack.top().view,
        transfer.action.label()
    );
    println!("{}", serde_json::to_string_pretty(&transfer)?);
    Ok(())
}

async fn load_envelope(args: &InspectArgs) -> Result<SignedEnvelope> {
    let token = args.token.trim();
    let looks_stored = token.len() == STORED_ID_LEN && token.bytes().all(|b| b.is_ascii_hexdigit());
    if !looks_stored {
        return decode_wire_token(token).context("not a GET/POST token");
    }

    let Some(url) = &args.database_url else {
        bail!("`{token}` looks like a database id; pass --database-url to look it up");
    };
    let store = crate::purge::open_store(url).await?;
    let bytes = store.get(token).await?;
    Ok(SignedEnvelope::from_bytes(&bytes)?)
}

fn signer(args: &InspectArgs) -> Result<Signer> {
    let secret = std::env::var(&args.key_env)
        .with_context(|| format!("${} is not set", args.key_env))?;
    let signer = match args.session {
        Some(_) => Signer::new(SessionKeys::new(secret.as_bytes())?),
        None => Signer::new(GlobalKey::new(secret.as_bytes())?),
    };

    match &args.cipher_key_env {
        Some(name) => {
            let encoded =
                std::env::var(name).with_context(|| format!("${name} is not set"))?;
            let key = URL_SAFE_NO_PAD
                .decode(encoded.trim())
                .with_context(|| format!("${name} is not base64url"))?;
            Ok(signer.with_cipher(AeadCipher::new(&key)?))
        }
        None => Ok(signer),
    }
}
