use std::sync::atomic::{AtomicU64, Ordering};

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a logical request id: `<unix millis>-<9 base36 chars>`.
///
/// Uniqueness is best effort; the id only correlates client and server logs.
pub fn new_request_id() -> String {
    format!("{}-{}", now_millis(), random_suffix())
}

fn random_suffix() -> String {
    let mut bytes = [0u8; SUFFIX_LEN];
    if getrandom::getrandom(&mut bytes).is_err() {
        // No entropy source: fall back to a process-local counter.
        let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes.copy_from_slice(&count.to_le_bytes().repeat(2)[..SUFFIX_LEN]);
    }
    bytes
        .iter()
        .map(|byte| char::from(ALPHABET[usize::from(*byte) % ALPHABET.len()]))
        .collect()
}

/// Milliseconds since the Unix epoch.
///
/// `SystemTime::now` panics on `wasm32-unknown-unknown`, so the browser clock
/// is used there.
pub(crate) fn now_millis() -> u64 {
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as u64
    }
}
