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

//! Generic cipher back-end over the mbedTLS cipher layer.
//!
//! Drop-in replacement for the EVP adapter when the build carries the
//! `mbedtls` feature without `openssl`; exposes the same surface.

use crate::{
    cipher::{Direction, Flags},
    error::{anyhow, Error},
    ErrorKind, Result,
};
use mbedtls::cipher::raw::{Cipher, CipherId, CipherMode, CipherPadding, Operation};

/// Everything the session needs to know about a cipher ahead of time;
/// the mbedTLS cipher layer is keyed by (id, mode, key bits) rather than
/// by name.
#[derive(Debug, Clone, Copy)]
pub struct Spec {
    id: CipherId,
    mode: CipherMode,
    key_bits: u32,
    iv_len: usize,
    block: usize,
}

impl Spec {
    pub fn key_length(&self) -> usize {
        (self.key_bits / 8) as usize
    }

    pub fn iv_length(&self) -> usize {
        self.iv_len
    }

    pub fn block_size(&self) -> usize {
        self.block
    }
}

pub type Handle = Spec;

const fn spec(id: CipherId, mode: CipherMode, key_bits: u32, iv_len: usize, block: usize) -> Spec {
    Spec {
        id,
        mode,
        key_bits,
        iv_len,
        block,
    }
}

/// Resolves a cipher name, probing that this mbedTLS build carries the
/// algorithm.
pub fn resolve(name: &str) -> Option<Handle> {
    let spec = match name {
        "rc4" => spec(CipherId::Arc4, CipherMode::STREAM, 128, 0, 1),
        "aes-128-cfb" => spec(CipherId::Aes, CipherMode::CFB, 128, 16, 16),
        "aes-128-ctr" => spec(CipherId::Aes, CipherMode::CTR, 128, 16, 16),
        "aes-128-ecb" => spec(CipherId::Aes, CipherMode::ECB, 128, 0, 16),
        "aes-128-cbc" => spec(CipherId::Aes, CipherMode::CBC, 128, 16, 16),
        "aes-128-gcm" => spec(CipherId::Aes, CipherMode::GCM, 128, 12, 16),
        "aes-192-cfb" => spec(CipherId::Aes, CipherMode::CFB, 192, 16, 16),
        "aes-192-ctr" => spec(CipherId::Aes, CipherMode::CTR, 192, 16, 16),
        "aes-192-ecb" => spec(CipherId::Aes, CipherMode::ECB, 192, 0, 16),
        "aes-192-cbc" => spec(CipherId::Aes, CipherMode::CBC, 192, 16, 16),
        "aes-192-gcm" => spec(CipherId::Aes, CipherMode::GCM, 192, 12, 16),
        "aes-256-cfb" => spec(CipherId::Aes, CipherMode::CFB, 256, 16, 16),
        "aes-256-ctr" => spec(CipherId::Aes, CipherMode::CTR, 256, 16, 16),
        "aes-256-ecb" => spec(CipherId::Aes, CipherMode::ECB, 256, 0, 16),
        "aes-256-cbc" => spec(CipherId::Aes, CipherMode::CBC, 256, 16, 16),
        "aes-256-gcm" => spec(CipherId::Aes, CipherMode::GCM, 256, 12, 16),
        "des-ecb" => spec(CipherId::Des, CipherMode::ECB, 64, 0, 8),
        "des-cbc" => spec(CipherId::Des, CipherMode::CBC, 64, 8, 8),
        "des-ede" => spec(CipherId::Des3, CipherMode::ECB, 128, 0, 8),
        "des-ede-cbc" => spec(CipherId::Des3, CipherMode::CBC, 128, 8, 8),
        "des-ede3" => spec(CipherId::Des3, CipherMode::ECB, 192, 0, 8),
        "des-ede3-cbc" => spec(CipherId::Des3, CipherMode::CBC, 192, 8, 8),
        "bf-cbc" => spec(CipherId::Blowfish, CipherMode::CBC, 128, 8, 8),
        "bf-cfb" => spec(CipherId::Blowfish, CipherMode::CFB, 128, 8, 8),
        "camellia-128-cfb" => spec(CipherId::Camellia, CipherMode::CFB, 128, 16, 16),
        "camellia-192-cfb" => spec(CipherId::Camellia, CipherMode::CFB, 192, 16, 16),
        "camellia-256-cfb" => spec(CipherId::Camellia, CipherMode::CFB, 256, 16, 16),
        "chacha20" => spec(CipherId::Chacha20, CipherMode::STREAM, 256, 12, 1),
        "chacha20-poly1305" => spec(CipherId::Chacha20, CipherMode::CHACHAPOLY, 256, 12, 1),
        _ => return None,
    };
    Cipher::setup(spec.id, spec.mode, spec.key_bits).ok()?;
    Some(spec)
}

fn operation_error(what: &str, err: mbedtls::Error) -> Error {
    anyhow!(@CipherOperation "{what}: {err}").with_code(err.to_int() as i64)
}

pub struct Context {
    cipher: Cipher,
    spec: Spec,
    direction: Direction,
}

impl Context {
    pub fn new(spec: Handle, direction: Direction) -> Result<Self> {
        let cipher = Cipher::setup(spec.id, spec.mode, spec.key_bits)
            .map_err(|err| operation_error("failed to set up cipher context", err))?;
        Ok(Self {
            cipher,
            spec,
            direction,
        })
    }

    pub fn key_length(&self) -> usize {
        self.spec.key_length()
    }

    fn operation(&self) -> Operation {
        match self.direction {
            Direction::Encrypt => Operation::Encrypt,
            Direction::Decrypt => Operation::Decrypt,
        }
    }

    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.cipher
            .set_key(self.operation(), key)
            .map_err(|err| operation_error("failed to bind key", err))
    }

    fn bind_iv(&mut self, iv: &[u8]) -> Result<()> {
        let result = (|| {
            if self.spec.iv_len > 0 || !iv.is_empty() {
                self.cipher.set_iv(iv)?;
            }
            self.cipher.reset()
        })();
        result.map_err(|err: mbedtls::Error| {
            operation_error("failed to bind iv", err).with_kind(ErrorKind::CipherOperationSetIv)
        })
    }

    fn set_padding(&mut self, no_padding: bool) -> Result<()> {
        // Only CBC pads in the mbedTLS cipher layer.
        if self.spec.mode != CipherMode::CBC {
            return Ok(());
        }
        let padding = if no_padding {
            CipherPadding::None
        } else {
            CipherPadding::Pkcs7
        };
        self.cipher
            .set_padding(padding)
            .map_err(|err| operation_error("failed to set padding", err))
    }

    fn run(&mut self, flags: Flags, no_padding: bool, iv: &[u8], input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.set_padding(no_padding)?;
        self.bind_iv(iv)?;
        let mut written = self
            .cipher
            .update(input, output)
            .map_err(|err| operation_error("cipher update failed", err))?;
        if !flags.contains(Flags::NO_FINISH) {
            written += self
                .cipher
                .finish(&mut output[written..])
                .map_err(|err| operation_error("cipher finish failed", err))?;
        }
        Ok(written)
    }

    pub fn encrypt(&mut self, flags: Flags, iv: &[u8], input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.run(flags, flags.contains(Flags::ENCRYPT_NO_PADDING), iv, input, output)
    }

    pub fn decrypt(&mut self, flags: Flags, iv: &[u8], input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.run(flags, flags.contains(Flags::DECRYPT_NO_PADDING), iv, input, output)
    }

    pub fn encrypt_aead(
        &mut self,
        _flags: Flags,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &mut [u8],
    ) -> Result<usize> {
        self.bind_iv(iv)?;
        if !ad.is_empty() {
            self.cipher
                .update_ad(ad)
                .map_err(|err| operation_error("failed to feed associated data", err))?;
        }
        let mut written = self
            .cipher
            .update(input, output)
            .map_err(|err| operation_error("cipher update failed", err))?;
        written += self
            .cipher
            .finish(&mut output[written..])
            .map_err(|err| operation_error("cipher finish failed", err))?;
        self.cipher
            .write_tag(tag)
            .map_err(|err| operation_error("failed to read tag", err))?;
        Ok(written)
    }

    pub fn decrypt_aead(
        &mut self,
        _flags: Flags,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &[u8],
    ) -> Result<usize> {
        self.bind_iv(iv)?;
        if !ad.is_empty() {
            self.cipher
                .update_ad(ad)
                .map_err(|err| operation_error("failed to feed associated data", err))?;
        }
        let mut written = self
            .cipher
            .update(input, output)
            .map_err(|err| operation_error("cipher update failed", err))?;
        written += self
            .cipher
            .finish(&mut output[written..])
            .map_err(|err| operation_error("cipher finish failed", err))?;
        self.cipher
            .check_tag(tag)
            .map_err(|err| operation_error("failed to authenticate", err))?;
        Ok(written)
    }
}
