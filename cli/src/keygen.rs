//! Random key material for `WAYSTACK_SECRET` and `WAYSTACK_CIPHER_KEY`

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};

pub fn run_keygen_command() -> Result<()> {
    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| anyhow!("system random source unavailable"))?;
    println!("{}", URL_SAFE_NO_PAD.encode(key));
    Ok(())
}
