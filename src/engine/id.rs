use std::fmt::Debug;

use base64::prelude::*;
use rand::RngCore;
use uuid::Uuid;

/// Source of session identifiers and challenge tokens.
pub trait IdSource: Debug {
    fn transaction_id(&self) -> String;

    fn challenge(&self) -> String;
}

/// UUID v4 transaction ids and 256-bit random challenges.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn transaction_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn challenge(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE64_URL_SAFE_NO_PAD.encode(bytes)
    }
}
