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

use super::{lookup, xxtea, Descriptor, Direction, Flags, Method, Mode};
use crate::{
    error::{anyhow, bail},
    Result,
};

#[cfg(any(feature = "openssl", feature = "mbedtls"))]
use super::generic;
#[cfg(feature = "sodium")]
use crate::sodium::{aead, stream};

/// Capacity of the session's key scratch buffer: the largest key any
/// stream/AEAD method takes. The generic back-end keeps its key inside
/// its own context instead.
pub const MAX_KEY_BYTES: usize = 32;

// Largest IV the facade meets: xsalsa20's 8-byte counter + 24-byte nonce.
const MAX_IV_BYTES: usize = 32;

enum Backend {
    Xxtea,
    #[cfg(any(feature = "openssl", feature = "mbedtls"))]
    Generic {
        handle: generic::Handle,
        enc: Option<generic::Context>,
        dec: Option<generic::Context>,
    },
    #[cfg(feature = "sodium")]
    Stream(&'static stream::Algorithm),
    #[cfg(feature = "sodium")]
    Aead(&'static aead::Algorithm),
}

/// A stateful cipher session.
///
/// Created empty; [`init`](Session::init) binds it to a registry entry and
/// opens the requested directions; [`close`](Session::close) (or drop)
/// releases everything. Key and IV may be replaced at any time in between,
/// and every encrypt/decrypt call is a self-contained one-shot starting
/// from the stored IV.
///
/// Sessions are single-owner and not internally synchronized.
pub struct Session {
    desc: Option<&'static Descriptor>,
    mode: Mode,
    backend: Option<Backend>,
    iv: smallvec::SmallVec<[u8; MAX_IV_BYTES]>,
    key: [u8; MAX_KEY_BYTES],
    last_error: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            desc: None,
            mode: Mode::NONE,
            backend: None,
            iv: smallvec::SmallVec::new(),
            key: [0; MAX_KEY_BYTES],
            last_error: 0,
        }
    }

    /// The registry entry this session is bound to, if initialized.
    pub fn descriptor(&self) -> Option<&'static Descriptor> {
        self.desc
    }

    /// The directions chosen at init; [`Mode::NONE`] when closed.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The back-end-native code of the most recent failure, 0 if none.
    pub fn last_errno(&self) -> i64 {
        self.last_error
    }

    pub fn is_aead(&self) -> bool {
        self.desc.map_or(false, Descriptor::is_aead)
    }

    /// Required IV length in bytes; 0 when uninitialized or IV-less.
    ///
    /// Sodium stream ciphers prepend an 8-byte block counter to the
    /// nonce, AEAD ones take the bare nonce.
    pub fn iv_size(&self) -> u32 {
        match &self.backend {
            None => 0,
            Some(Backend::Xxtea) => 0,
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Some(Backend::Generic { handle, .. }) => handle.iv_length() as u32,
            #[cfg(feature = "sodium")]
            Some(Backend::Stream(alg)) => (8 + alg.nonce_len) as u32,
            #[cfg(feature = "sodium")]
            Some(Backend::Aead(alg)) => alg.nonce_len as u32,
        }
    }

    /// Required key size in bits; 0 when uninitialized.
    pub fn key_bits(&self) -> u32 {
        match &self.backend {
            None => 0,
            Some(Backend::Xxtea) => (xxtea::KEY_BYTES * 8) as u32,
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Some(Backend::Generic { handle, .. }) => (handle.key_length() * 8) as u32,
            #[cfg(feature = "sodium")]
            Some(Backend::Stream(alg)) => (alg.key_len * 8) as u32,
            #[cfg(feature = "sodium")]
            Some(Backend::Aead(alg)) => (alg.key_len * 8) as u32,
        }
    }

    /// Cipher block size in bytes; 1 for stream/AEAD methods, 0 when
    /// uninitialized.
    pub fn block_size(&self) -> u32 {
        match &self.backend {
            None => 0,
            Some(Backend::Xxtea) => xxtea::BLOCK_BYTES as u32,
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Some(Backend::Generic { handle, .. }) => handle.block_size() as u32,
            #[cfg(feature = "sodium")]
            Some(Backend::Stream(_)) | Some(Backend::Aead(_)) => 1,
        }
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.last_error = err.code();
        }
        result
    }

    /// Binds the session to `name` and opens the given directions.
    pub fn init(&mut self, name: &str, mode: Mode) -> Result<()> {
        let result = self.init_inner(name, mode);
        self.track(result)
    }

    fn init_inner(&mut self, name: &str, mode: Mode) -> Result<()> {
        if self.desc.is_some() {
            bail!(@AlreadyInited "session is already bound to {}", self.desc.unwrap().name);
        }
        if name.is_empty() || mode.is_empty() {
            bail!(@InvalidParam "cipher name and mode must be non-empty");
        }
        let desc = match lookup(name) {
            Some(desc) => desc,
            None => bail!(@CipherNotSupport "unknown cipher {name:?}"),
        };

        let backend = match desc.method {
            Method::Invalid => bail!(@CipherNotSupport "{name:?} is not usable"),
            Method::Xxtea => Backend::Xxtea,
            Method::Cipher => {
                #[cfg(any(feature = "openssl", feature = "mbedtls"))]
                {
                    let handle = match generic::resolve(desc.backend_name()) {
                        Some(handle) => handle,
                        None => {
                            bail!(@CipherNotSupport "{:?} is unavailable in this build", desc.backend_name())
                        }
                    };
                    let enc = if mode.contains(Mode::ENCRYPT) {
                        Some(generic::Context::new(handle, Direction::Encrypt)?)
                    } else {
                        None
                    };
                    let dec = if mode.contains(Mode::DECRYPT) {
                        Some(generic::Context::new(handle, Direction::Decrypt)?)
                    } else {
                        None
                    };
                    Backend::Generic { handle, enc, dec }
                }
                #[cfg(not(any(feature = "openssl", feature = "mbedtls")))]
                {
                    bail!(@CipherNotSupport "no generic cipher back-end in this build")
                }
            }
            #[cfg(feature = "sodium")]
            Method::SodiumChacha20 => Backend::Stream(&stream::CHACHA20),
            #[cfg(feature = "sodium")]
            Method::SodiumChacha20Ietf => Backend::Stream(&stream::CHACHA20_IETF),
            #[cfg(feature = "sodium")]
            Method::SodiumXchacha20 => Backend::Stream(&stream::XCHACHA20),
            #[cfg(feature = "sodium")]
            Method::SodiumSalsa20 => Backend::Stream(&stream::SALSA20),
            #[cfg(feature = "sodium")]
            Method::SodiumXsalsa20 => Backend::Stream(&stream::XSALSA20),
            #[cfg(feature = "sodium")]
            Method::SodiumChacha20Poly1305 => Backend::Aead(&aead::CHACHA20_POLY1305),
            #[cfg(feature = "sodium")]
            Method::SodiumChacha20Poly1305Ietf => Backend::Aead(&aead::CHACHA20_POLY1305_IETF),
            #[cfg(feature = "sodium")]
            Method::SodiumXchacha20Poly1305Ietf => Backend::Aead(&aead::XCHACHA20_POLY1305_IETF),
            #[cfg(not(feature = "sodium"))]
            _ => bail!(@CipherNotSupport "{name:?} needs the sodium back-end"),
        };

        self.desc = Some(desc);
        self.mode = mode;
        self.backend = Some(backend);
        Ok(())
    }

    /// Unbinds the session, releasing back-end contexts and wiping key
    /// and IV state. The last error code survives.
    pub fn close(&mut self) -> Result<()> {
        if self.desc.is_none() {
            let result = Err(anyhow!(@NotInited "session is not initialized"));
            return self.track(result);
        }
        self.desc = None;
        self.mode = Mode::NONE;
        self.backend = None;
        self.iv.clear();
        self.wipe_key();
        Ok(())
    }

    /// Stores a key. The generic back-end requires at least
    /// [`key_bits`](Session::key_bits) worth of material and ignores any
    /// excess; XXTEA and the sodium methods copy into the session's
    /// scratch buffer and never fail.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        let result = self.set_key_inner(key);
        self.track(result)
    }

    fn set_key_inner(&mut self, key: &[u8]) -> Result<()> {
        let backend = match &mut self.backend {
            Some(backend) => backend,
            None => bail!(@NotInited "session is not initialized"),
        };
        match backend {
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Backend::Generic { enc, dec, .. } => {
                let required = enc
                    .as_ref()
                    .or(dec.as_ref())
                    .map(generic::Context::key_length)
                    .unwrap_or(0);
                if key.len() < required {
                    bail!(@InvalidParam "key must be at least {required} bytes, got {}", key.len());
                }
                let key = &key[..required];
                if let Some(ctx) = enc {
                    ctx.set_key(key)?;
                }
                if let Some(ctx) = dec {
                    ctx.set_key(key)?;
                }
                Ok(())
            }
            _ => {
                let n = key.len().min(MAX_KEY_BYTES);
                self.key = [0; MAX_KEY_BYTES];
                self.key[..n].copy_from_slice(&key[..n]);
                Ok(())
            }
        }
    }

    /// Stores an IV verbatim. Fixed-IV ciphers demand exactly
    /// [`iv_size`](Session::iv_size) bytes; variable-IV ones take any
    /// length and leave validation to the back-end.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        let result = self.set_iv_inner(iv);
        self.track(result)
    }

    fn set_iv_inner(&mut self, iv: &[u8]) -> Result<()> {
        let desc = match self.desc {
            Some(desc) => desc,
            None => bail!(@NotInited "session is not initialized"),
        };
        if !desc.flags.contains(Flags::VARIABLE_IV_LEN) && iv.len() != self.iv_size() as usize {
            bail!(@InvalidParam "iv must be {} bytes, got {}", self.iv_size(), iv.len());
        }
        self.iv.clear();
        self.iv.extend_from_slice(iv);
        Ok(())
    }

    pub fn clear_iv(&mut self) {
        self.iv.clear();
    }

    /// Zero-fills the stored IV up to the required size; an IV the caller
    /// left short (or never set) behaves as if padded with zeros.
    fn pad_iv(&mut self) {
        let desc = match self.desc {
            Some(desc) => desc,
            None => return,
        };
        let size = self.iv_size() as usize;
        if !desc.flags.contains(Flags::VARIABLE_IV_LEN) && self.iv.len() < size {
            self.iv.resize(size, 0);
        }
    }

    /// One-shot encryption. `output` must hold at least
    /// `input.len() + block_size()` bytes; returns the bytes written.
    pub fn encrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let result = self.crypt(input, output, Direction::Encrypt);
        self.track(result)
    }

    /// One-shot decryption; same buffer contract as [`encrypt`](Session::encrypt).
    pub fn decrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let result = self.crypt(input, output, Direction::Decrypt);
        self.track(result)
    }

    fn crypt(&mut self, input: &[u8], output: &mut [u8], dir: Direction) -> Result<usize> {
        let desc = match self.desc {
            Some(desc) => desc,
            None => bail!(@NotInited "session is not initialized"),
        };
        if desc.is_aead() {
            bail!(@MustCallAeadApi "{} is an AEAD cipher", desc.name);
        }
        if output.len() < input.len() + self.block_size() as usize {
            bail!(@InvalidParam "output buffer must hold at least input length plus one block");
        }
        self.require_direction(dir)?;
        self.pad_iv();

        match self.backend.as_mut().unwrap() {
            Backend::Xxtea => {
                let key = xxtea::Key::new(&self.key);
                Ok(match dir {
                    Direction::Encrypt => key.encrypt(input, output),
                    Direction::Decrypt => key.decrypt(input, output),
                })
            }
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Backend::Generic { enc, dec, .. } => {
                let (ctx, flags) = match dir {
                    Direction::Encrypt => (enc.as_mut().unwrap(), desc.flags),
                    Direction::Decrypt => (dec.as_mut().unwrap(), desc.flags),
                };
                match dir {
                    Direction::Encrypt => ctx.encrypt(flags, &self.iv, input, output),
                    Direction::Decrypt => ctx.decrypt(flags, &self.iv, input, output),
                }
            }
            #[cfg(feature = "sodium")]
            Backend::Stream(alg) => {
                let (ic, nonce) = split_stream_iv(&self.iv, alg.nonce_len);
                alg.xor_ic(
                    &mut output[..input.len()],
                    input,
                    nonce,
                    ic,
                    &self.key[..alg.key_len],
                )?;
                Ok(input.len())
            }
            #[cfg(feature = "sodium")]
            Backend::Aead(_) => bail!(@MustCallAeadApi "{} is an AEAD cipher", desc.name),
        }
    }

    /// One-shot AEAD encryption with a detached tag. `tag` receives the
    /// authentication tag; for sodium methods it must hold at least the
    /// algorithm's tag size.
    pub fn encrypt_aead(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &mut [u8],
    ) -> Result<usize> {
        let result = self.encrypt_aead_inner(input, output, ad, tag);
        self.track(result)
    }

    fn encrypt_aead_inner(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &mut [u8],
    ) -> Result<usize> {
        let desc = self.check_aead(input, output)?;
        self.require_direction(Direction::Encrypt)?;
        self.pad_iv();

        match self.backend.as_mut().unwrap() {
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Backend::Generic { enc, .. } => {
                enc.as_mut()
                    .unwrap()
                    .encrypt_aead(desc.flags, &self.iv, input, output, ad, tag)
            }
            #[cfg(feature = "sodium")]
            Backend::Aead(alg) => {
                if tag.len() < alg.tag_len {
                    bail!(@SodiumOperationTagLen "tag buffer must hold at least {} bytes", alg.tag_len);
                }
                alg.encrypt(
                    &mut output[..input.len()],
                    &mut tag[..alg.tag_len],
                    input,
                    (!ad.is_empty()).then_some(ad),
                    &self.iv,
                    &self.key[..alg.key_len],
                )?;
                Ok(input.len())
            }
            _ => bail!(@MustNotCallAeadApi "{} is not an AEAD cipher", desc.name),
        }
    }

    /// One-shot AEAD decryption; `tag` is the detached tag to verify.
    pub fn decrypt_aead(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &[u8],
    ) -> Result<usize> {
        let result = self.decrypt_aead_inner(input, output, ad, tag);
        self.track(result)
    }

    fn decrypt_aead_inner(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ad: &[u8],
        tag: &[u8],
    ) -> Result<usize> {
        let desc = self.check_aead(input, output)?;
        self.require_direction(Direction::Decrypt)?;
        self.pad_iv();

        match self.backend.as_mut().unwrap() {
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            Backend::Generic { dec, .. } => {
                dec.as_mut()
                    .unwrap()
                    .decrypt_aead(desc.flags, &self.iv, input, output, ad, tag)
            }
            #[cfg(feature = "sodium")]
            Backend::Aead(alg) => {
                if tag.len() < alg.tag_len {
                    bail!(@SodiumOperationTagLen "tag must hold at least {} bytes", alg.tag_len);
                }
                alg.decrypt(
                    &mut output[..input.len()],
                    input,
                    &tag[..alg.tag_len],
                    (!ad.is_empty()).then_some(ad),
                    &self.iv,
                    &self.key[..alg.key_len],
                )?;
                Ok(input.len())
            }
            _ => bail!(@MustNotCallAeadApi "{} is not an AEAD cipher", desc.name),
        }
    }

    fn check_aead(&self, input: &[u8], output: &mut [u8]) -> Result<&'static Descriptor> {
        let desc = match self.desc {
            Some(desc) => desc,
            None => bail!(@NotInited "session is not initialized"),
        };
        if !desc.is_aead() {
            bail!(@MustNotCallAeadApi "{} is not an AEAD cipher", desc.name);
        }
        if output.len() < input.len() + self.block_size() as usize {
            bail!(@InvalidParam "output buffer must hold at least input length plus one block");
        }
        Ok(desc)
    }

    /// Fails with `CipherDisabled` when the generic back-end was opened
    /// without the requested direction. Other methods are direction-free.
    fn require_direction(&self, dir: Direction) -> Result<()> {
        #[cfg(any(feature = "openssl", feature = "mbedtls"))]
        if let Some(Backend::Generic { enc, dec, .. }) = &self.backend {
            let present = match dir {
                Direction::Encrypt => enc.is_some(),
                Direction::Decrypt => dec.is_some(),
            };
            if !present {
                let what = match dir {
                    Direction::Encrypt => "encryption",
                    Direction::Decrypt => "decryption",
                };
                bail!(@CipherDisabled "{what} was not requested at init");
            }
        }
        #[cfg(not(any(feature = "openssl", feature = "mbedtls")))]
        let _ = dir;
        Ok(())
    }

    fn wipe_key(&mut self) {
        #[cfg(feature = "sodium")]
        crate::sodium::utils::memzero(&mut self.key);
        #[cfg(not(feature = "sodium"))]
        self.key.fill(0);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.wipe_key();
    }
}

/// Splits a sodium stream IV into its 8-byte little-endian block counter
/// (two 32-bit words, high word at bytes 4..8) and the trailing nonce.
#[cfg(feature = "sodium")]
fn split_stream_iv(iv: &[u8], nonce_len: usize) -> (u64, &[u8]) {
    debug_assert_eq!(iv.len(), 8 + nonce_len);
    let lo = u32::from_le_bytes([iv[0], iv[1], iv[2], iv[3]]) as u64;
    let hi = u32::from_le_bytes([iv[4], iv[5], iv[6], iv[7]]) as u64;
    (hi << 32 | lo, &iv[8..8 + nonce_len])
}
