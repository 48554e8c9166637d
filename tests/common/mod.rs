use std::sync::Arc;

use lineage as lc;

/// Root context whose logger writes into a fresh in-memory sink.
pub fn captured_root(name: &str) -> (lc::Context, Arc<lc::MemorySink>) {
    let mem = Arc::new(lc::MemorySink::new());
    let sink: Arc<dyn lc::Sink> = mem.clone();
    let ctx = lc::Context::new(None, None, Some(lc::Logger::with_sink(name, "", sink)));
    (ctx, mem)
}

/// Strip the name prefix and return the 12-digit suffix.
#[allow(dead_code)]
pub fn suffix_of<'a>(name: &'a str, prefix: &str) -> &'a str {
    let rest = name
        .strip_prefix(prefix)
        .unwrap_or_else(|| panic!("{name} does not start with {prefix}"));
    assert_eq!(rest.len(), 12, "suffix must be 12 digits: {rest}");
    assert!(rest.chars().all(|c| c.is_ascii_digit()), "non-digit suffix: {rest}");
    rest
}
