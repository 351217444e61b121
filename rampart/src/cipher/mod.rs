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

//! The unified symmetric-cipher facade.
//!
//! One call surface over whichever back-ends the build carries: the EVP
//! layer of OpenSSL (or the mbedTLS cipher layer in its place), the
//! libsodium stream/AEAD primitives, and the built-in XXTEA fallback.
//! Algorithms are addressed by canonical name through a fixed registry;
//! the first entry matching a name wins, so a name served by several
//! back-ends always resolves to the same one.

mod session;
pub mod xxtea;

pub use session::Session;

use crate::Result;

#[cfg(feature = "openssl")]
pub(crate) use crate::evp as generic;
#[cfg(all(feature = "mbedtls", not(feature = "openssl")))]
pub(crate) use crate::mbed as generic;

/// How a registry entry is serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Invalid,
    /// The built-in XXTEA block cipher.
    Xxtea,
    /// The generic back-end (EVP or mbedTLS cipher layer).
    Cipher,
    SodiumChacha20,
    SodiumChacha20Ietf,
    SodiumXchacha20,
    SodiumSalsa20,
    SodiumXsalsa20,
    SodiumChacha20Poly1305,
    SodiumChacha20Poly1305Ietf,
    SodiumXchacha20Poly1305Ietf,
}

/// Per-entry behavior switches applied by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Skip the back-end's finalization step; the update output is the
    /// whole output.
    pub const NO_FINISH: Flags = Flags(1 << 0);
    pub const AEAD: Flags = Flags(1 << 1);
    /// The IV length is caller-chosen and must be announced to the
    /// back-end before key/IV are bound.
    pub const VARIABLE_IV_LEN: Flags = Flags(1 << 2);
    /// The plaintext length must be announced before any data update.
    pub const AEAD_SET_LENGTH_BEFORE: Flags = Flags(1 << 3);
    pub const DECRYPT_NO_PADDING: Flags = Flags(1 << 4);
    pub const ENCRYPT_NO_PADDING: Flags = Flags(1 << 5);

    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.union(rhs)
    }
}

/// The directions a session is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u32);

impl Mode {
    pub const NONE: Mode = Mode(0);
    pub const ENCRYPT: Mode = Mode(1 << 0);
    pub const DECRYPT: Mode = Mode(1 << 1);
    pub const BOTH: Mode = Mode(Self::ENCRYPT.0 | Self::DECRYPT.0);

    pub const fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        Mode(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Direction {
    Encrypt,
    Decrypt,
}

/// One registry entry: a canonical name bound to the method servicing it.
#[derive(Debug)]
pub struct Descriptor {
    /// Canonical name, matched case-insensitively.
    pub name: &'static str,
    pub method: Method,
    /// Back-end-specific name, when it differs from the canonical one.
    pub alt_name: Option<&'static str>,
    pub flags: Flags,
}

impl Descriptor {
    pub fn is_aead(&self) -> bool {
        self.flags.contains(Flags::AEAD)
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.alt_name.unwrap_or(self.name)
    }
}

const fn entry(name: &'static str, method: Method, flags: Flags) -> Descriptor {
    Descriptor {
        name,
        method,
        alt_name: None,
        flags,
    }
}

const NO_PADDING: Flags = Flags::ENCRYPT_NO_PADDING.union(Flags::DECRYPT_NO_PADDING);
const AEAD_IV: Flags = Flags::AEAD.union(Flags::VARIABLE_IV_LEN);

static CIPHERS_CORE: &[Descriptor] = &[entry("xxtea", Method::Xxtea, Flags::NONE)];

// ECB entries run unpadded in both directions: the mbedTLS cipher layer
// never pads ECB, and output must not depend on the generic back-end.
#[cfg(any(feature = "openssl", feature = "mbedtls"))]
static CIPHERS_GENERIC: &[Descriptor] = &[
    entry("rc4", Method::Cipher, Flags::NO_FINISH),
    entry("aes-128-cfb", Method::Cipher, Flags::NONE),
    entry("aes-128-ctr", Method::Cipher, Flags::NONE),
    entry("aes-128-ecb", Method::Cipher, NO_PADDING),
    entry("aes-128-cbc", Method::Cipher, Flags::NONE),
    entry("aes-128-gcm", Method::Cipher, AEAD_IV),
    entry("aes-192-cfb", Method::Cipher, Flags::NONE),
    entry("aes-192-ctr", Method::Cipher, Flags::NONE),
    entry("aes-192-ecb", Method::Cipher, NO_PADDING),
    entry("aes-192-cbc", Method::Cipher, Flags::NONE),
    entry("aes-192-gcm", Method::Cipher, AEAD_IV),
    entry("aes-256-cfb", Method::Cipher, Flags::NONE),
    entry("aes-256-ctr", Method::Cipher, Flags::NONE),
    entry("aes-256-ecb", Method::Cipher, NO_PADDING),
    entry("aes-256-cbc", Method::Cipher, Flags::NONE),
    entry("aes-256-gcm", Method::Cipher, AEAD_IV),
    entry("des-ecb", Method::Cipher, NO_PADDING),
    entry("des-cbc", Method::Cipher, Flags::NONE),
    entry("des-ede", Method::Cipher, NO_PADDING),
    entry("des-ede-cbc", Method::Cipher, Flags::NONE),
    entry("des-ede3", Method::Cipher, NO_PADDING),
    entry("des-ede3-cbc", Method::Cipher, Flags::NONE),
    entry("bf-cbc", Method::Cipher, Flags::NONE),
    entry("bf-cfb", Method::Cipher, Flags::NONE),
    entry("camellia-128-cfb", Method::Cipher, Flags::NONE),
    entry("camellia-192-cfb", Method::Cipher, Flags::NONE),
    entry("camellia-256-cfb", Method::Cipher, Flags::NONE),
    entry("chacha20", Method::Cipher, Flags::NO_FINISH),
    Descriptor {
        name: "chacha20-poly1305-ietf",
        method: Method::Cipher,
        // OpenSSL's chacha20-poly1305 is the IETF construction.
        alt_name: Some("chacha20-poly1305"),
        flags: AEAD_IV,
    },
];

#[cfg(feature = "sodium")]
static CIPHERS_SODIUM: &[Descriptor] = &[
    entry("chacha20", Method::SodiumChacha20, Flags::NONE),
    entry("chacha20-ietf", Method::SodiumChacha20Ietf, Flags::NONE),
    entry("xchacha20", Method::SodiumXchacha20, Flags::NONE),
    entry("salsa20", Method::SodiumSalsa20, Flags::NONE),
    entry("xsalsa20", Method::SodiumXsalsa20, Flags::NONE),
    entry("chacha20-poly1305", Method::SodiumChacha20Poly1305, Flags::AEAD),
    entry(
        "chacha20-poly1305-ietf",
        Method::SodiumChacha20Poly1305Ietf,
        Flags::AEAD,
    ),
    entry(
        "xchacha20-poly1305-ietf",
        Method::SodiumXchacha20Poly1305Ietf,
        Flags::AEAD,
    ),
];

/// All registry entries, in registry order.
fn entries() -> impl Iterator<Item = &'static Descriptor> {
    let it = CIPHERS_CORE.iter();
    #[cfg(any(feature = "openssl", feature = "mbedtls"))]
    let it = it.chain(CIPHERS_GENERIC.iter());
    #[cfg(feature = "sodium")]
    let it = it.chain(CIPHERS_SODIUM.iter());
    it
}

/// Finds the first registry entry matching `name`, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static Descriptor> {
    entries().find(|desc| desc.name.eq_ignore_ascii_case(name))
}

/// Whether the entry's back-end resolves in this build, at runtime.
pub fn is_available(desc: &Descriptor) -> bool {
    match desc.method {
        Method::Invalid => false,
        Method::Xxtea => true,
        Method::Cipher => {
            #[cfg(any(feature = "openssl", feature = "mbedtls"))]
            {
                generic::resolve(desc.backend_name()).is_some()
            }
            #[cfg(not(any(feature = "openssl", feature = "mbedtls")))]
            {
                false
            }
        }
        #[cfg(feature = "sodium")]
        _ => true,
        #[cfg(not(feature = "sodium"))]
        _ => false,
    }
}

/// Canonical names usable in this build, in registry order.
pub fn list_available() -> Vec<&'static str> {
    entries()
        .filter(|desc| is_available(desc))
        .map(|desc| desc.name)
        .collect()
}

const fn is_name_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | ',' | ';' | ':')
}

/// Iterates over the cipher names of a delimited configuration string
/// without allocating; see [`split_names`].
pub struct SplitNames<'a> {
    rest: &'a str,
}

impl<'a> Iterator for SplitNames<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let begin = self.rest.find(|c| !is_name_delimiter(c))?;
        let rest = &self.rest[begin..];
        let end = rest.find(is_name_delimiter).unwrap_or(rest.len());
        let (token, rest) = rest.split_at(end);
        self.rest = rest;
        Some(token)
    }
}

/// Splits a list of cipher names on any of space, tab, CR, LF, comma,
/// semicolon or colon, skipping empty segments.
pub fn split_names(input: &str) -> SplitNames<'_> {
    SplitNames { rest: input }
}

/// Registers the process-wide cipher catalogue on back-ends that need it.
/// Idempotent; call before the first session.
pub fn init_global_algorithm() -> Result<()> {
    #[cfg(feature = "sodium")]
    unsafe {
        if libsodium_sys::sodium_init() < 0 {
            crate::bail!(@SodiumOperation "failed to initialize libsodium");
        }
    }
    tracing::debug!("cipher back-ends initialized");
    Ok(())
}

/// Symmetric teardown of [`init_global_algorithm`]. Neither OpenSSL nor
/// libsodium needs an explicit teardown, so this only exists to pin the
/// lifecycle for callers.
pub fn cleanup_global_algorithm() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(lookup("XXTEA").is_some());
        assert!(lookup("Aes-256-Gcm").is_some());
        assert!(lookup("nonsense").is_none());
        assert!(lookup("").is_none());
    }

    #[cfg(any(feature = "openssl", feature = "mbedtls", feature = "sodium"))]
    #[test]
    fn test_first_entry_wins() {
        // Both the generic and the sodium tables register chacha20; the
        // generic entry must take precedence.
        let desc = lookup("chacha20").unwrap();
        #[cfg(any(feature = "openssl", feature = "mbedtls"))]
        assert_eq!(desc.method, Method::Cipher);
        #[cfg(not(any(feature = "openssl", feature = "mbedtls")))]
        assert_eq!(desc.method, Method::SodiumChacha20);

        let desc = lookup("chacha20-poly1305-ietf").unwrap();
        #[cfg(any(feature = "openssl", feature = "mbedtls"))]
        assert_eq!(desc.backend_name(), "chacha20-poly1305");
        #[cfg(not(any(feature = "openssl", feature = "mbedtls")))]
        assert_eq!(desc.method, Method::SodiumChacha20Poly1305Ietf);
    }

    #[test]
    fn test_list_available_respects_registry_order() {
        let names = list_available();
        assert_eq!(names[0], "xxtea");

        #[cfg(feature = "openssl")]
        {
            let cfb = names.iter().position(|name| *name == "aes-128-cfb").unwrap();
            let gcm = names.iter().position(|name| *name == "aes-256-gcm").unwrap();
            assert!(cfb < gcm);
        }

        #[cfg(feature = "sodium")]
        {
            let salsa = names.iter().position(|name| *name == "salsa20").unwrap();
            let xsalsa = names.iter().position(|name| *name == "xsalsa20").unwrap();
            assert!(salsa < xsalsa);
        }

        // A name served by two back-ends is listed once per entry.
        #[cfg(all(feature = "openssl", feature = "sodium"))]
        assert_eq!(names.iter().filter(|name| **name == "chacha20").count(), 2);
    }

    #[test]
    fn test_split_names() {
        let tokens: Vec<_> = split_names("aes-256-gcm, chacha20-poly1305-ietf").collect();
        assert_eq!(tokens, ["aes-256-gcm", "chacha20-poly1305-ietf"]);

        let tokens: Vec<_> = split_names(";;\t xxtea\r\nrc4:salsa20,").collect();
        assert_eq!(tokens, ["xxtea", "rc4", "salsa20"]);

        assert_eq!(split_names("").count(), 0);
        assert_eq!(split_names(" \t;,").count(), 0);
    }
}
