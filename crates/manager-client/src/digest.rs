// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const DIGEST_HEADER: &str = "X-Worker-Digest";

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the raw request body, hex-encoded for the
/// `X-Worker-Digest` header.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_and_keyed() {
        let a = sign(b"secret-one", b"{\"worker\":{\"state\":\"IDLE\"}}");
        let b = sign(b"secret-one", b"{\"worker\":{\"state\":\"IDLE\"}}");
        let c = sign(b"secret-two", b"{\"worker\":{\"state\":\"IDLE\"}}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
