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

use rampart::{cipher, ErrorKind, Mode, Session};

// The ChaCha20 keystream for an all-zero key, nonce and counter; identical
// for the original and the IETF construction since every state word is 0.
const ZERO_KEYSTREAM: &str = "76b8e0ada0f13d90405d6ae55386bd28\
                              bdd219b8a08ded1aa836efcc8b770dc7\
                              da41597c5157488d7724e03fb8d84a37\
                              6a43b8f41518a11cc387b669b2ee6586";

// AES-256-GCM of "hello world" under an all-zero key and nonce with
// associated data deadbeef, as produced by reference implementations.
const GCM_CIPHERTEXT: &str = "a6c22c5122401c017522a1";
const GCM_TAG: &str = "abb5fea78bcd9a43074c16e797a29d6c";

fn open(name: &str, mode: Mode) -> Session {
    rampart::init().unwrap();
    let mut session = Session::new();
    session.init(name, mode).unwrap();
    session
}

fn kind(result: rampart::Result<usize>) -> ErrorKind {
    result.unwrap_err().kind()
}

#[test]
fn test_xxtea_round_trip() {
    let mut session = open("xxtea", Mode::BOTH);
    session
        .set_key(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap())
        .unwrap();
    assert_eq!(session.block_size(), 4);
    assert_eq!(session.key_bits(), 128);
    assert_eq!(session.iv_size(), 0);
    assert!(!session.is_aead());

    let plain = hex::decode("0123456789abcdef").unwrap();
    let mut cipher = [0u8; 12];
    let clen = session.encrypt(&plain, &mut cipher).unwrap();
    assert_eq!(clen, 8);
    assert_ne!(&cipher[..8], &plain[..]);

    let mut output = [0u8; 12];
    let plen = session.decrypt(&cipher[..8], &mut output).unwrap();
    assert_eq!(plen, 8);
    assert_eq!(&output[..8], &plain[..]);
}

#[cfg(feature = "openssl")]
#[test]
fn test_aes_256_gcm_round_trip_and_tamper() {
    let mut session = open("aes-256-gcm", Mode::BOTH);
    assert!(session.is_aead());
    session.set_key(&[0u8; 32]).unwrap();
    session.set_iv(&[0u8; 12]).unwrap();

    let ad = hex::decode("deadbeef").unwrap();
    let plain = b"hello world";
    let mut cipher = vec![0u8; plain.len() + 16];
    let mut tag = [0u8; 16];
    let clen = session.encrypt_aead(plain, &mut cipher, &ad, &mut tag).unwrap();
    assert_eq!(clen, plain.len());
    assert_eq!(hex::encode(&cipher[..clen]), GCM_CIPHERTEXT);
    assert_eq!(hex::encode(tag), GCM_TAG);

    let mut output = vec![0u8; clen + 16];
    let plen = session.decrypt_aead(&cipher[..clen], &mut output, &ad, &tag).unwrap();
    assert_eq!(&output[..plen], plain);

    // A single flipped tag bit must fail authentication.
    let mut bad_tag = tag;
    bad_tag[0] ^= 1;
    assert_eq!(
        kind(session.decrypt_aead(&cipher[..clen], &mut output, &ad, &bad_tag)),
        ErrorKind::CipherOperation
    );

    // Same for ciphertext and associated data.
    let mut bad_cipher = cipher.clone();
    bad_cipher[0] ^= 0x80;
    assert_eq!(
        kind(session.decrypt_aead(&bad_cipher[..clen], &mut output, &ad, &tag)),
        ErrorKind::CipherOperation
    );
    let mut bad_ad = ad.clone();
    bad_ad[3] ^= 4;
    assert_eq!(
        kind(session.decrypt_aead(&cipher[..clen], &mut output, &bad_ad, &tag)),
        ErrorKind::CipherOperation
    );

    // Failures leave the session usable.
    let plen = session.decrypt_aead(&cipher[..clen], &mut output, &ad, &tag).unwrap();
    assert_eq!(&output[..plen], plain);
}

#[cfg(feature = "openssl")]
#[test]
fn test_generic_chacha20_keystream() {
    // OpenSSL's chacha20 takes a 16-byte IV: 32-bit little-endian counter
    // followed by the 12-byte nonce. All zeros selects the reference
    // keystream.
    let mut session = open("chacha20", Mode::ENCRYPT);
    session.set_key(&[0u8; 32]).unwrap();
    session.set_iv(&[0u8; 16]).unwrap();

    let mut cipher = [0u8; 65];
    let clen = session.encrypt(&[0u8; 64], &mut cipher).unwrap();
    assert_eq!(clen, 64);
    assert_eq!(hex::encode(&cipher[..64]), ZERO_KEYSTREAM);
}

#[cfg(feature = "sodium")]
#[test]
fn test_sodium_chacha20_ietf_keystream() {
    let mut session = open("chacha20-ietf", Mode::ENCRYPT);
    assert_eq!(session.iv_size(), 8 + 12);
    session.set_key(&[0u8; 32]).unwrap();
    session.set_iv(&[0u8; 20]).unwrap();

    let mut cipher = [0u8; 65];
    let clen = session.encrypt(&[0u8; 64], &mut cipher).unwrap();
    assert_eq!(clen, 64);
    assert_eq!(hex::encode(&cipher[..64]), ZERO_KEYSTREAM);
}

#[cfg(feature = "sodium")]
#[test]
fn test_sodium_stream_counter_prefix() {
    // The first 8 IV bytes are a little-endian block counter: encrypting
    // with counter 1 must reproduce the second block of a counter-0 run.
    let nonce: Vec<u8> = (0u8..12).collect();

    let mut iv = vec![0u8; 8];
    iv.extend_from_slice(&nonce);
    let mut session = open("chacha20-ietf", Mode::ENCRYPT);
    session.set_key(&[7u8; 32]).unwrap();
    session.set_iv(&iv).unwrap();
    let mut two_blocks = [0u8; 129];
    session.encrypt(&[0u8; 128], &mut two_blocks).unwrap();

    iv[0] = 1;
    session.set_iv(&iv).unwrap();
    let mut second = [0u8; 65];
    session.encrypt(&[0u8; 64], &mut second).unwrap();
    assert_eq!(&second[..64], &two_blocks[64..128]);
}

#[cfg(feature = "openssl")]
#[test]
fn test_short_iv_is_rejected_then_zero_padded() {
    let mut session = open("aes-128-ctr", Mode::BOTH);
    session.set_key(&[1u8; 16]).unwrap();

    // Wrong length is an error for fixed-IV ciphers...
    assert_eq!(
        session.set_iv(&[0u8; 8]).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );
    session.set_iv(&[0u8; 16]).unwrap();
    let mut expected = [0u8; 32];
    let clen = session.encrypt(&[0x5au8; 16], &mut expected).unwrap();
    assert_eq!(clen, 16);

    // ...while an unset IV behaves as all zeros.
    let mut session = open("aes-128-ctr", Mode::BOTH);
    session.set_key(&[1u8; 16]).unwrap();
    let mut cipher = [0u8; 32];
    let clen = session.encrypt(&[0x5au8; 16], &mut cipher).unwrap();
    assert_eq!(clen, 16);
    assert_eq!(cipher, expected);
}

#[cfg(feature = "openssl")]
#[test]
fn test_disabled_direction() {
    let mut session = open("aes-128-cbc", Mode::ENCRYPT);
    session.set_key(&[0u8; 16]).unwrap();
    let mut output = [0u8; 48];
    assert_eq!(
        kind(session.decrypt(&[0u8; 16], &mut output)),
        ErrorKind::CipherDisabled
    );
    // The encrypt direction still works.
    session.encrypt(&[0u8; 16], &mut output).unwrap();
}

#[test]
fn test_list_available() {
    rampart::init().unwrap();
    let names = cipher::list_available();
    assert_eq!(names[0], "xxtea");
    #[cfg(feature = "openssl")]
    assert!(names.contains(&"aes-256-gcm"));
    #[cfg(feature = "sodium")]
    assert!(names.contains(&"xchacha20-poly1305-ietf"));
    #[cfg(not(feature = "sodium"))]
    assert!(!names.contains(&"xchacha20-poly1305-ietf"));

    #[cfg(feature = "openssl")]
    assert_eq!(
        cipher::lookup("chacha20").unwrap().method,
        rampart::Method::Cipher
    );
}

#[test]
fn test_round_trip_every_available_cipher() {
    rampart::init().unwrap();
    let key: Vec<u8> = (0u8..32).collect();
    let ad = b"header";
    let plain: Vec<u8> = (0u8..64).map(|i| i.wrapping_mul(37)).collect();

    for name in cipher::list_available() {
        let mut session = Session::new();
        session.init(name, Mode::BOTH).unwrap();
        session.set_key(&key).unwrap();
        let iv_len = session.iv_size() as usize;
        if iv_len > 0 {
            session.set_iv(&vec![0x24u8; iv_len]).unwrap();
        }

        let block = session.block_size() as usize;
        let mut cipher = vec![0u8; plain.len() + block + 16];
        let mut output = vec![0u8; plain.len() + 2 * (block + 16)];
        if session.is_aead() {
            let mut tag = [0u8; 16];
            let clen = session
                .encrypt_aead(&plain, &mut cipher, ad, &mut tag)
                .unwrap_or_else(|err| panic!("{name}: encrypt_aead failed: {err}"));
            let plen = session
                .decrypt_aead(&cipher[..clen], &mut output, ad, &tag)
                .unwrap_or_else(|err| panic!("{name}: decrypt_aead failed: {err}"));
            assert_eq!(&output[..plen], &plain[..], "{name} round trip");
        } else {
            let clen = session
                .encrypt(&plain, &mut cipher)
                .unwrap_or_else(|err| panic!("{name}: encrypt failed: {err}"));
            let plen = session
                .decrypt(&cipher[..clen], &mut output)
                .unwrap_or_else(|err| panic!("{name}: decrypt failed: {err}"));
            assert_eq!(&output[..plain.len()], &plain[..], "{name} round trip");
            assert!(plen >= plain.len(), "{name} reported {plen} bytes");
        }
    }
}

#[test]
fn test_large_input_round_trip() {
    let plain: Vec<u8> = (0..1 << 20).map(|i| (i * 31 % 251) as u8).collect();
    let mut names = vec!["xxtea"];
    #[cfg(feature = "openssl")]
    names.push("aes-256-cfb");
    #[cfg(feature = "sodium")]
    names.push("xchacha20");

    for name in names {
        let mut session = open(name, Mode::BOTH);
        session.set_key(&(0u8..32).collect::<Vec<u8>>()).unwrap();

        let mut cipher = vec![0u8; plain.len() + 16];
        let mut output = vec![0u8; plain.len() + 16];
        let clen = session.encrypt(&plain, &mut cipher).unwrap();
        let plen = session.decrypt(&cipher[..clen], &mut output).unwrap();
        assert_eq!(plen, plain.len(), "{name}");
        assert_eq!(&output[..plen], &plain[..], "{name}");
    }
}

#[test]
fn test_aead_api_misuse() {
    let mut output = [0u8; 64];
    let mut tag = [0u8; 16];

    let mut session = open("xxtea", Mode::BOTH);
    session.set_key(&[0u8; 16]).unwrap();
    assert_eq!(
        kind(session.encrypt_aead(&[0u8; 8], &mut output, b"", &mut tag)),
        ErrorKind::MustNotCallAeadApi
    );
    assert_eq!(
        kind(session.decrypt_aead(&[0u8; 8], &mut output, b"", &tag)),
        ErrorKind::MustNotCallAeadApi
    );

    #[cfg(feature = "openssl")]
    {
        let mut session = open("aes-256-gcm", Mode::BOTH);
        session.set_key(&[0u8; 32]).unwrap();
        assert_eq!(
            kind(session.encrypt(&[0u8; 8], &mut output)),
            ErrorKind::MustCallAeadApi
        );
    }

    #[cfg(feature = "sodium")]
    {
        let mut session = open("chacha20-poly1305", Mode::BOTH);
        session.set_key(&[0u8; 32]).unwrap();
        assert_eq!(
            kind(session.encrypt(&[0u8; 8], &mut output)),
            ErrorKind::MustCallAeadApi
        );

        let mut session = open("salsa20", Mode::BOTH);
        session.set_key(&[0u8; 32]).unwrap();
        assert_eq!(
            kind(session.encrypt_aead(&[0u8; 8], &mut output, b"", &mut tag)),
            ErrorKind::MustNotCallAeadApi
        );
    }
}

#[test]
fn test_lifecycle() {
    rampart::init().unwrap();
    let mut session = Session::new();
    let mut output = [0u8; 16];

    assert_eq!(
        kind(session.encrypt(&[0u8; 8], &mut output)),
        ErrorKind::NotInited
    );
    assert_eq!(
        session.init("", Mode::BOTH).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );
    assert_eq!(
        session.init("xxtea", Mode::NONE).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );
    assert_eq!(
        session.init("no-such-cipher", Mode::BOTH).unwrap_err().kind(),
        ErrorKind::CipherNotSupport
    );

    session.init("xxtea", Mode::BOTH).unwrap();
    assert_eq!(
        session.init("xxtea", Mode::BOTH).unwrap_err().kind(),
        ErrorKind::AlreadyInited
    );
    // The failed re-init must not disturb the existing binding.
    assert_eq!(session.descriptor().unwrap().name, "xxtea");

    session.close().unwrap();
    assert_eq!(session.close().unwrap_err().kind(), ErrorKind::NotInited);
    session.init("xxtea", Mode::BOTH).unwrap();
}

#[cfg(feature = "sodium")]
#[test]
fn test_sodium_aead_round_trip_and_tag_len() {
    let mut session = open("xchacha20-poly1305-ietf", Mode::BOTH);
    assert_eq!(session.iv_size(), 24);
    session.set_key(&[9u8; 32]).unwrap();
    session.set_iv(&[3u8; 24]).unwrap();

    let plain = b"exactly the bytes we sent";
    let mut cipher = vec![0u8; plain.len() + 1];
    let mut output = vec![0u8; plain.len() + 1];
    let mut tag = [0u8; 16];

    let mut short_tag = [0u8; 8];
    let result = session.encrypt_aead(plain, &mut cipher, b"", &mut short_tag);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::SodiumOperationTagLen);

    let clen = session.encrypt_aead(plain, &mut cipher, b"ad", &mut tag).unwrap();
    let plen = session.decrypt_aead(&cipher[..clen], &mut output, b"ad", &tag).unwrap();
    assert_eq!(&output[..plen], plain);

    let mut bad_tag = tag;
    bad_tag[15] ^= 0x10;
    assert_eq!(
        kind(session.decrypt_aead(&cipher[..clen], &mut output, b"ad", &bad_tag)),
        ErrorKind::SodiumOperation
    );
    assert_ne!(session.last_errno(), 0);
}

#[cfg(all(feature = "openssl", feature = "sodium"))]
#[test]
fn test_generic_chacha20_poly1305_matches_libsodium() {
    // The generic chacha20-poly1305-ietf entry rides OpenSSL; its output
    // must be bit-identical to libsodium's IETF construction.
    let key = [0x42u8; 32];
    let nonce: Vec<u8> = (100u8..112).collect();
    let plain = b"cross-backend sanity";
    let ad = b"framing";

    let mut session = open("chacha20-poly1305-ietf", Mode::ENCRYPT);
    assert_eq!(
        session.descriptor().unwrap().method,
        rampart::Method::Cipher
    );
    session.set_key(&key).unwrap();
    session.set_iv(&nonce).unwrap();
    let mut cipher = vec![0u8; plain.len() + 1];
    let mut tag = [0u8; 16];
    let clen = session.encrypt_aead(plain, &mut cipher, ad, &mut tag).unwrap();
    assert_eq!(clen, plain.len());

    let mut output = vec![0u8; plain.len()];
    let ret = unsafe {
        libsodium_sys::crypto_aead_chacha20poly1305_ietf_decrypt_detached(
            output.as_mut_ptr(),
            std::ptr::null_mut(),
            cipher.as_ptr(),
            clen as u64,
            tag.as_ptr(),
            ad.as_ptr(),
            ad.len() as u64,
            nonce.as_ptr(),
            key.as_ptr(),
        )
    };
    assert_eq!(ret, 0, "libsodium rejected the OpenSSL-produced AEAD");
    assert_eq!(&output[..], plain);
}

#[cfg(feature = "openssl")]
#[test]
fn test_variable_iv_length_aead() {
    // GCM accepts caller-chosen nonce lengths; 8 bytes must round-trip.
    let mut session = open("aes-256-gcm", Mode::BOTH);
    session.set_key(&[6u8; 32]).unwrap();
    session.set_iv(&[0xabu8; 8]).unwrap();

    let plain = b"shorter nonce";
    let mut cipher = vec![0u8; plain.len() + 1];
    let mut output = vec![0u8; plain.len() + 1];
    let mut tag = [0u8; 16];
    let clen = session.encrypt_aead(plain, &mut cipher, b"", &mut tag).unwrap();
    let plen = session.decrypt_aead(&cipher[..clen], &mut output, b"", &tag).unwrap();
    assert_eq!(&output[..plen], plain);
}

#[cfg(feature = "openssl")]
#[test]
fn test_generic_key_length_rules() {
    let mut session = open("aes-256-cbc", Mode::BOTH);
    assert_eq!(session.key_bits(), 256);
    assert_eq!(
        session.set_key(&[0u8; 16]).unwrap_err().kind(),
        ErrorKind::InvalidParam
    );

    // Longer keys are truncated to the required length.
    session.set_key(&(0u8..48).collect::<Vec<u8>>()).unwrap();
    let mut with_long = [0u8; 48];
    let clen = session.encrypt(&[1u8; 16], &mut with_long).unwrap();

    let mut session = open("aes-256-cbc", Mode::BOTH);
    session.set_key(&(0u8..32).collect::<Vec<u8>>()).unwrap();
    let mut with_exact = [0u8; 48];
    assert_eq!(session.encrypt(&[1u8; 16], &mut with_exact).unwrap(), clen);
    assert_eq!(with_long, with_exact);
}
