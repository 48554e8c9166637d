//! Session names and the per-context session marker.
//!
//! Invariants
//! - `boot_id()` is generated once per process.
//! - Names from one generator are `prefix + header + 12-digit sequence`; the sequence is a
//!   single atomic counter shared by every caller of that generator.
//! - Installing a new process-wide generator restarts the sequence under the new header.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use once_cell::sync::{Lazy, OnceCell};

use crate::context::Context;
use crate::logger::format_sequence;

/// Length of the boot-id prefix used in generator headers.
pub const BOOT_ID_PREFIX_LEN: usize = 24;

static BOOT_ID: OnceCell<String> = OnceCell::new();

fn random_uuid_string() -> String {
    let mut b = [0u8; 16];
    if getrandom::getrandom(&mut b).is_err() {
        // Fall back to time and pid; uniqueness per boot is all that is needed.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mix = nanos ^ ((std::process::id() as u128) << 64);
        b = mix.to_le_bytes();
    }
    // RFC 4122 version 4, variant 1.
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    let hex: String = b.iter().map(|x| format!("{x:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Random identifier of this process run, UUID formatted.
pub fn boot_id() -> &'static str {
    BOOT_ID.get_or_init(random_uuid_string)
}

fn boot_prefix() -> &'static str {
    &boot_id()[..BOOT_ID_PREFIX_LEN]
}

#[derive(Debug)]
pub struct SessionNameGenerator {
    header: String,
    counter: AtomicU64,
}

impl SessionNameGenerator {
    pub fn new(header: impl Into<String>) -> Self {
        SessionNameGenerator {
            header: header.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn next(&self, prefix: Option<&str>) -> String {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "{}{}{}",
            prefix.unwrap_or(""),
            self.header,
            format_sequence(seq)
        )
    }
}

static GENERATOR: Lazy<RwLock<Arc<SessionNameGenerator>>> =
    Lazy::new(|| RwLock::new(Arc::new(SessionNameGenerator::new(boot_prefix()))));

/// Current process-wide generator.
pub fn generator() -> Arc<SessionNameGenerator> {
    let g = GENERATOR.read().unwrap_or_else(|e| e.into_inner());
    Arc::clone(&g)
}

/// Next name from the process-wide generator.
pub fn session_name(prefix: Option<&str>) -> String {
    generator().next(prefix)
}

/// Install a generator whose header is `prefix` followed by the boot-id prefix.
pub fn use_prefixed_session_name(prefix: &str) {
    let next = Arc::new(SessionNameGenerator::new(format!("{prefix}{}", boot_prefix())));
    let mut g = GENERATOR.write().unwrap_or_else(|e| e.into_inner());
    *g = next;
}

#[derive(Debug, Hash, PartialEq, Eq)]
struct SessionKey;

/// Record the real session name in the context's env.
pub fn set_session(ctx: &Context, session: &str) {
    ctx.env().set(SessionKey, session.to_string());
}

/// The recorded session name when non-empty, otherwise the context name.
pub fn session(ctx: &Context) -> String {
    match real_session(ctx) {
        Some(s) if !s.is_empty() => s,
        _ => ctx.name().to_string(),
    }
}

/// The recorded session name, if any.
pub fn real_session(ctx: &Context) -> Option<String> {
    ctx.env().get_string(SessionKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_boot_id_is_stable_and_uuid_shaped() {
        let id = boot_id();
        assert_eq!(id, boot_id());
        assert_eq!(id.len(), 36);
        let dashes: Vec<usize> = id.match_indices('-').map(|(i, _)| i).collect();
        assert_eq!(dashes, vec![8, 13, 18, 23]);
        assert_eq!(&id[14..15], "4");
    }

    #[test]
    fn test_generator_pads_and_prefixes() {
        let g = SessionNameGenerator::new("hdr-");
        assert_eq!(g.next(None), "hdr-000000000001");
        assert_eq!(g.next(Some("job:")), "job:hdr-000000000002");
        assert_eq!(g.header(), "hdr-");
    }

    #[test]
    fn test_generator_unique_under_threads() {
        let g = Arc::new(SessionNameGenerator::new("t"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = Arc::clone(&g);
                thread::spawn(move || (0..250).map(|_| g.next(None)).collect::<Vec<_>>())
            })
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for name in h.join().expect("generator thread") {
                assert!(all.insert(name), "duplicate session name");
            }
        }
        assert_eq!(all.len(), 1000);
        assert!(all.contains("t000000001000"));
    }

    #[test]
    fn test_session_falls_back_to_context_name() {
        let ctx = Context::named("api");
        assert_eq!(session(&ctx), "api");
        assert_eq!(real_session(&ctx), None);

        set_session(&ctx, "");
        assert_eq!(session(&ctx), "api");
        assert_eq!(real_session(&ctx).as_deref(), Some(""));

        let child = ctx.fork();
        set_session(&ctx, "s-42");
        assert_eq!(session(&child), "s-42", "children see the parent's marker");
    }
}
