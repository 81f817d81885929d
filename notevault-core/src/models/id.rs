//! Identifier types (§3, §4.5, §9 "Identifier choice").

use std::sync::atomic::{AtomicU64, Ordering};

use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Generate a 12-character nanoid, used for surrogate row ids where the
/// natural key (tenant, object_key) isn't convenient (e.g. join columns).
#[must_use]
pub fn generate_id() -> String {
    nanoid!(12)
}

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Encodes a 128-bit value as a fixed-width, lexicographically order-preserving
/// 26-character Crockford base32 string (same construction as a ULID body).
fn encode_u128(mut value: u128) -> String {
    let mut buf = [0u8; 26];
    for slot in buf.iter_mut().rev() {
        *slot = CROCKFORD[(value & 0x1F) as usize];
        value >>= 5;
    }
    // SAFETY-free: every byte comes from CROCKFORD, which is ASCII.
    String::from_utf8(buf.to_vec()).expect("crockford alphabet is valid utf-8")
}

static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Returns a sequence number that is `0` the first time it's called for a
/// given millisecond and strictly increasing for subsequent calls within the
/// same millisecond, guaranteeing total order even on ties.
fn next_sequence(now_millis: u64) -> u64 {
    loop {
        let last = LAST_MILLIS.load(Ordering::Acquire);
        if now_millis > last {
            if LAST_MILLIS
                .compare_exchange(last, now_millis, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                SEQUENCE.store(0, Ordering::Release);
                return 0;
            }
            continue;
        }
        return SEQUENCE.fetch_add(1, Ordering::AcqRel) + 1;
    }
}

/// Share identifier: `"sh_"` + a 128-bit monotonic lexicographic token seeded
/// from the current UTC millisecond (§4.5, §9). Sorting by `ShareId` as a
/// string is equivalent to sorting by creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub String);

impl ShareId {
    #[must_use]
    pub fn new() -> Self {
        let now_millis = u64::try_from(chrono::Utc::now().timestamp_millis().max(0))
            .unwrap_or(u64::MAX);
        let seq = next_sequence(now_millis);
        let token = (u128::from(now_millis) << 64) | u128::from(seq);
        Self(format!("sh_{}", encode_u128(token)))
    }

    #[must_use]
    pub const fn from_string(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ShareId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl sqlx::Type<sqlx::Postgres> for ShareId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for ShareId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShareId {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_is_twelve_chars() {
        assert_eq!(generate_id().len(), 12);
    }

    #[test]
    fn share_id_has_prefix() {
        let id = ShareId::new();
        assert!(id.as_str().starts_with("sh_"));
        assert_eq!(id.as_str().len(), 3 + 26);
    }

    #[test]
    fn share_ids_are_strictly_monotonic() {
        let mut ids = Vec::new();
        for _ in 0..500 {
            ids.push(ShareId::new().0);
        }
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "share ids must be created in lexicographic order");
        for pair in ids.windows(2) {
            assert_ne!(pair[0], pair[1], "same-millisecond creates must stay distinct");
        }
    }

    #[test]
    fn encode_u128_preserves_numeric_order() {
        let a = encode_u128(5);
        let b = encode_u128(6);
        let c = encode_u128(1 << 64);
        assert!(a < b);
        assert!(b < c);
    }
}
