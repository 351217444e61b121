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

//! Generic cipher back-end over OpenSSL's EVP layer.
//!
//! Contexts are created per direction at session init; key and IV are
//! bound late, and every one-shot operation re-binds the IV so repeated
//! calls are independent of each other.

use crate::{
    cipher::{Direction, Flags},
    error::{anyhow, Error},
    ErrorKind, Result,
};
use openssl::{
    cipher::{Cipher, CipherRef},
    cipher_ctx::CipherCtx,
    error::ErrorStack,
    nid::Nid,
};

pub type Handle = &'static CipherRef;

/// Resolves a cipher name to its EVP cipher, probing that the current
/// libcrypto can actually instantiate it (legacy algorithms may be
/// compiled out or live in an unloaded provider).
pub fn resolve(name: &str) -> Option<Handle> {
    let nid = match name {
        "rc4" => Nid::RC4,
        "aes-128-cfb" => Nid::AES_128_CFB128,
        "aes-128-ctr" => Nid::AES_128_CTR,
        "aes-128-ecb" => Nid::AES_128_ECB,
        "aes-128-cbc" => Nid::AES_128_CBC,
        "aes-128-gcm" => Nid::AES_128_GCM,
        "aes-192-cfb" => Nid::AES_192_CFB128,
        "aes-192-ctr" => Nid::AES_192_CTR,
        "aes-192-ecb" => Nid::AES_192_ECB,
        "aes-192-cbc" => Nid::AES_192_CBC,
        "aes-192-gcm" => Nid::AES_192_GCM,
        "aes-256-cfb" => Nid::AES_256_CFB128,
        "aes-256-ctr" => Nid::AES_256_CTR,
        "aes-256-ecb" => Nid::AES_256_ECB,
        "aes-256-cbc" => Nid::AES_256_CBC,
        "aes-256-gcm" => Nid::AES_256_GCM,
        "des-ecb" => Nid::DES_ECB,
        "des-cbc" => Nid::DES_CBC,
        "des-ede" => Nid::DES_EDE_ECB,
        "des-ede-cbc" => Nid::DES_EDE_CBC,
        "des-ede3" => Nid::DES_EDE3_ECB,
        "des-ede3-cbc" => Nid::DES_EDE3_CBC,
        "bf-cbc" => Nid::BF_CBC,
        "bf-cfb" => Nid::BF_CFB64,
        "camellia-128-cfb" => Nid::CAMELLIA_128_CFB128,
        "camellia-192-cfb" => Nid::CAMELLIA_192_CFB128,
        "camellia-256-cfb" => Nid::CAMELLIA_256_CFB128,
        "chacha20" => Nid::CHACHA20,
        "chacha20-poly1305" => Nid::CHACHA20_POLY1305,
        _ => return None,
    };
    let cipher = Cipher::from_nid(nid)?;

    // EVP_get_cipherbynid still answers for algorithms the runtime cannot
    // instantiate; a throwaway init weeds those out.
    let mut ctx = CipherCtx::new().ok()?;
    ctx.encrypt_init(Some(cipher), None, None).ok()?;
    Some(cipher)
}

fn native_code(err: &ErrorStack) -> i64 {
    err.errors().first().map_or(0, |e| e.code() as i64)
}

fn operation_error(what: &str, err: ErrorStack) -> Error {
    let code = native_code(&err);
    anyhow!(@CipherOperation "{what}: {err}").with_code(code)
}

pub struct Context {
    ctx: CipherCtx,
    cipher: Handle,
    direction: Direction,
}

impl Context {
    pub fn new(cipher: Handle, direction: Direction) -> Result<Self> {
        let mut ctx = CipherCtx::new()
            .map_err(|err| anyhow!(@Malloc "failed to allocate cipher context: {err}"))?;
        let init = match direction {
            Direction::Encrypt => ctx.encrypt_init(Some(cipher), None, None),
            Direction::Decrypt => ctx.decrypt_init(Some(cipher), None, None),
        };
        init.map_err(|err| operation_error("failed to initialize cipher context", err))?;
        Ok(Self {
            ctx,
            cipher,
            direction,
        })
    }

    pub fn key_length(&self) -> usize {
        self.cipher.key_length()
    }

    fn rebind(&mut self, key: Option<&[u8]>, iv: Option<&[u8]>) -> Result<(), ErrorStack> {
        match self.direction {
            Direction::Encrypt => self.ctx.encrypt_init(None, key, iv),
            Direction::Decrypt => self.ctx.decrypt_init(None, key, iv),
        }
    }

    /// Binds a key of exactly the cipher's required length; the session
    /// truncates longer keys before calling.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.rebind(Some(key), None)
            .map_err(|err| operation_error("failed to bind key", err))
    }

    fn bind_iv(&mut self, iv: &[u8], flags: Flags) -> Result<()> {
        let result = (|| {
            if flags.contains(Flags::VARIABLE_IV_LEN) {
                self.ctx.set_iv_length(iv.len())?;
            }
            if self.cipher.iv_length() > 0 || flags.contains(Flags::VARIABLE_IV_LEN) {
                self.rebind(None, Some(iv))?;
            }
            Ok(())
        })();
        result.map_err(|err: ErrorStack| {
            operation_error("failed to bind iv", err).with_kind(ErrorKind::CipherOperationSetIv)
        })
    }

    pub fn encrypt(&mut self, flags: Flags, iv: &[u8], input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.bind_iv(iv, flags)?;
        self.ctx
            .set_padding(!flags.contains(Flags::ENCRYPT_NO_PADDING));
        let mut written = self
            .ctx
            .cipher_update(input, Some(output))
            .map_err(|err| operation_error("failed to encrypt", err))?;
        if !flags.contains(Flags::NO_FINISH) {
            written += self
                .ctx
                .cipher_final(&mut output[written..])
                .map_err(|err| operation_error("failed to finish encryption", err))?;
        }
        Ok(written)
    }

    pub fn decrypt(&mut self, flags: Flags, iv: &[u8], input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.bind_iv(iv, flags)?;
        self.ctx
            .set_padding(!flags.contains(Flags::DECRYPT_NO_PADDING));
        let mut written = self
            .ctx
            .cipher_update(input, Some(output))
            .map_err(|err| operation_error("failed to decrypt", err))?;
        if !flags.contains(Flags::NO_FINISH) {
            written += self
                .ctx
                .cipher_final(&mut output[written..])
                .map_err(|err| operation_error("failed to finish decryption", err))?;
        }
        Ok(written)
    }

    pub fn encrypt_aead(
        &mut self,
        flags: Flags,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &mut [u8],
    ) -> Result<usize> {
        self.bind_iv(iv, flags)?;
        if flags.contains(Flags::AEAD_SET_LENGTH_BEFORE) {
            self.ctx
                .set_data_len(input.len())
                .map_err(|err| operation_error("failed to announce data length", err))?;
        }
        if !ad.is_empty() {
            self.ctx
                .cipher_update(ad, None)
                .map_err(|err| operation_error("failed to feed associated data", err))?;
        }
        let mut written = self
            .ctx
            .cipher_update(input, Some(output))
            .map_err(|err| operation_error("failed to encrypt", err))?;
        written += self
            .ctx
            .cipher_final(&mut output[written..])
            .map_err(|err| operation_error("failed to finish encryption", err))?;
        self.ctx
            .tag(tag)
            .map_err(|err| operation_error("failed to read tag", err))?;
        Ok(written)
    }

    pub fn decrypt_aead(
        &mut self,
        flags: Flags,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &[u8],
    ) -> Result<usize> {
        self.bind_iv(iv, flags)?;
        if flags.contains(Flags::AEAD_SET_LENGTH_BEFORE) {
            self.ctx
                .set_data_len(input.len())
                .map_err(|err| operation_error("failed to announce data length", err))?;
        }
        if !ad.is_empty() {
            self.ctx
                .cipher_update(ad, None)
                .map_err(|err| operation_error("failed to feed associated data", err))?;
        }
        let mut written = self
            .ctx
            .cipher_update(input, Some(output))
            .map_err(|err| operation_error("failed to decrypt", err))?;
        self.ctx
            .set_tag(tag)
            .map_err(|err| operation_error("failed to set tag", err))?;
        written += self
            .ctx
            .cipher_final(&mut output[written..])
            .map_err(|err| operation_error("failed to authenticate", err))?;
        Ok(written)
    }
}
