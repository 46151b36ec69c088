use chrono::{DateTime, Utc};
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const ORDER_ID_LEN: usize = 8;

pub fn random_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// 8 uppercase base-36 characters, e.g. `K7Q2M9ZD`.
pub fn order_id() -> String {
    random_id(&mut rand::thread_rng(), ORDER_ID_LEN)
}

/// 時間戳開頭，字典序即建立順序
pub fn record_id(now: DateTime<Utc>) -> String {
    format!(
        "{:013}{}",
        now.timestamp_millis().max(0),
        random_id(&mut rand::thread_rng(), 4)
    )
}
