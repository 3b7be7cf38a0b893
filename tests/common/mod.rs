//! Link key pair generated once per test binary

use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

static KEY: OnceLock<(RsaPrivateKey, String)> = OnceLock::new();

fn pair() -> &'static (RsaPrivateKey, String) {
    KEY.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, public)
    })
}

#[allow(dead_code)]
pub fn private_key() -> &'static RsaPrivateKey {
    &pair().0
}

pub fn public_pem() -> String {
    pair().1.clone()
}
