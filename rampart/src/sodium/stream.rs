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

use crate::{error::anyhow, Result};
use libsodium_sys::*;

/// A libsodium stream cipher, addressed by its XOR-with-initial-counter
/// entry point.
///
/// The `ic` argument is the initial 64-byte-block counter; primitives whose
/// native counter is 32-bit truncate it.
pub struct Algorithm {
    pub nonce_len: usize,
    pub key_len: usize,

    xor_ic: unsafe fn(
        c: *mut u8,
        m: *const u8,
        mlen: u64,
        n: *const u8,
        ic: u64,
        k: *const u8,
    ) -> libc::c_int,
}

impl Algorithm {
    fn check(&self, nonce: &[u8], key: &[u8]) {
        assert_eq!(self.nonce_len, nonce.len());
        assert_eq!(self.key_len, key.len());
    }

    pub fn xor_ic(
        &self,
        output: &mut [u8],
        input: &[u8],
        nonce: &[u8],
        ic: u64,
        key: &[u8],
    ) -> Result<()> {
        self.check(nonce, key);
        assert!(output.len() >= input.len());
        unsafe {
            let ret = (self.xor_ic)(
                output.as_mut_ptr(),
                input.as_ptr(),
                input.len() as u64,
                nonce.as_ptr(),
                ic,
                key.as_ptr(),
            );
            if ret == 0 {
                Ok(())
            } else {
                Err(anyhow!(@SodiumOperation "failed to xor stream").with_code(ret as i64))
            }
        }
    }
}

unsafe fn chacha20(c: *mut u8, m: *const u8, mlen: u64, n: *const u8, ic: u64, k: *const u8) -> libc::c_int {
    crypto_stream_chacha20_xor_ic(c as _, m as _, mlen as _, n as _, ic, k as _)
}

unsafe fn chacha20_ietf(c: *mut u8, m: *const u8, mlen: u64, n: *const u8, ic: u64, k: *const u8) -> libc::c_int {
    crypto_stream_chacha20_ietf_xor_ic(c as _, m as _, mlen as _, n as _, ic as u32, k as _)
}

unsafe fn xchacha20(c: *mut u8, m: *const u8, mlen: u64, n: *const u8, ic: u64, k: *const u8) -> libc::c_int {
    crypto_stream_xchacha20_xor_ic(c as _, m as _, mlen as _, n as _, ic, k as _)
}

unsafe fn salsa20(c: *mut u8, m: *const u8, mlen: u64, n: *const u8, ic: u64, k: *const u8) -> libc::c_int {
    crypto_stream_salsa20_xor_ic(c as _, m as _, mlen as _, n as _, ic, k as _)
}

unsafe fn xsalsa20(c: *mut u8, m: *const u8, mlen: u64, n: *const u8, ic: u64, k: *const u8) -> libc::c_int {
    crypto_stream_xsalsa20_xor_ic(c as _, m as _, mlen as _, n as _, ic, k as _)
}

pub const CHACHA20: Algorithm = Algorithm {
    nonce_len: crypto_stream_chacha20_NONCEBYTES as _,
    key_len: crypto_stream_chacha20_KEYBYTES as _,

    xor_ic: chacha20,
};

pub const CHACHA20_IETF: Algorithm = Algorithm {
    nonce_len: crypto_stream_chacha20_ietf_NONCEBYTES as _,
    key_len: crypto_stream_chacha20_ietf_KEYBYTES as _,

    xor_ic: chacha20_ietf,
};

pub const XCHACHA20: Algorithm = Algorithm {
    nonce_len: crypto_stream_xchacha20_NONCEBYTES as _,
    key_len: crypto_stream_xchacha20_KEYBYTES as _,

    xor_ic: xchacha20,
};

pub const SALSA20: Algorithm = Algorithm {
    nonce_len: crypto_stream_salsa20_NONCEBYTES as _,
    key_len: crypto_stream_salsa20_KEYBYTES as _,

    xor_ic: salsa20,
};

pub const XSALSA20: Algorithm = Algorithm {
    nonce_len: crypto_stream_xsalsa20_NONCEBYTES as _,
    key_len: crypto_stream_xsalsa20_KEYBYTES as _,

    xor_ic: xsalsa20,
};
