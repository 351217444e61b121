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

pub mod cipher;
mod error;
#[cfg(feature = "openssl")]
mod evp;
#[cfg(all(feature = "mbedtls", not(feature = "openssl")))]
mod mbed;
#[cfg(feature = "sodium")]
mod sodium;

pub(crate) use error::{anyhow, bail};

pub use cipher::{Descriptor, Flags, Method, Mode, Session};
pub use error::{Error, ErrorKind, Result};

/// Initializes Rampart's cipher back-ends.
///
/// Should be called before any use of this library; idempotent.
pub fn init() -> Result<()> {
    cipher::init_global_algorithm()
}

/// Tears down what [`init`] set up. Call at most once, after the last
/// session is gone.
pub fn cleanup() -> Result<()> {
    cipher::cleanup_global_algorithm()
}
