// Copyright 2023 Mivik
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rampart::{cipher, Mode, Session};
use tracing_log::LogTracer;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the cipher names usable in this build
    List,

    /// Encrypt hex input with a cipher
    Encrypt {
        /// the cipher name, e.g. `aes-256-gcm`
        cipher: String,

        /// the key, hex-encoded
        #[arg(short, long)]
        key: String,

        /// the IV, hex-encoded
        #[arg(short, long, default_value = "")]
        iv: String,

        /// associated data for AEAD ciphers, hex-encoded
        #[arg(short, long, default_value = "")]
        ad: String,

        /// the plaintext, hex-encoded
        input: String,
    },

    /// Decrypt hex input with a cipher
    Decrypt {
        /// the cipher name, e.g. `aes-256-gcm`
        cipher: String,

        /// the key, hex-encoded
        #[arg(short, long)]
        key: String,

        /// the IV, hex-encoded
        #[arg(short, long, default_value = "")]
        iv: String,

        /// associated data for AEAD ciphers, hex-encoded
        #[arg(short, long, default_value = "")]
        ad: String,

        /// the detached tag for AEAD ciphers, hex-encoded
        #[arg(short, long, default_value = "")]
        tag: String,

        /// the ciphertext, hex-encoded
        input: String,
    },
}

fn open(name: &str, mode: Mode, key: &str, iv: &str) -> Result<Session> {
    let mut session = Session::new();
    session
        .init(name, mode)
        .with_context(|| format!("cannot open cipher {name:?}"))?;
    session.set_key(&hex::decode(key).context("key is not valid hex")?)?;
    if !iv.is_empty() {
        session.set_iv(&hex::decode(iv).context("iv is not valid hex")?)?;
    }
    Ok(session)
}

fn main() -> Result<()> {
    LogTracer::init()?;

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer().with_writer(std::io::stderr).with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        ),
    );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    rampart::init()?;

    match Args::parse().command {
        Command::List => {
            for name in cipher::list_available() {
                println!("{name}");
            }
        }
        Command::Encrypt {
            cipher,
            key,
            iv,
            ad,
            input,
        } => {
            let mut session = open(&cipher, Mode::ENCRYPT, &key, &iv)?;
            let input = hex::decode(input).context("input is not valid hex")?;
            let mut output = vec![0u8; input.len() + session.block_size() as usize + 16];
            if session.is_aead() {
                let ad = hex::decode(ad).context("ad is not valid hex")?;
                let mut tag = [0u8; 16];
                let len = session.encrypt_aead(&input, &mut output, &ad, &mut tag)?;
                println!("{}", hex::encode(&output[..len]));
                println!("tag: {}", hex::encode(tag));
            } else {
                let len = session.encrypt(&input, &mut output)?;
                println!("{}", hex::encode(&output[..len]));
            }
        }
        Command::Decrypt {
            cipher,
            key,
            iv,
            ad,
            tag,
            input,
        } => {
            let mut session = open(&cipher, Mode::DECRYPT, &key, &iv)?;
            let input = hex::decode(input).context("input is not valid hex")?;
            let mut output = vec![0u8; input.len() + session.block_size() as usize + 16];
            if session.is_aead() {
                if tag.is_empty() {
                    bail!("AEAD ciphers need --tag");
                }
                let ad = hex::decode(ad).context("ad is not valid hex")?;
                let tag = hex::decode(tag).context("tag is not valid hex")?;
                let len = session.decrypt_aead(&input, &mut output, &ad, &tag)?;
                println!("{}", hex::encode(&output[..len]));
            } else {
                let len = session.decrypt(&input, &mut output)?;
                println!("{}", hex::encode(&output[..len]));
            }
        }
    }

    Ok(())
}
