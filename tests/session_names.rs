use lineage as lc;

// Single test: the process-wide generator is shared by the whole binary.
#[test]
fn test_process_generator_and_prefix_switch() {
    let boot = lc::boot_id();
    let header = &boot[..lc::session::BOOT_ID_PREFIX_LEN];

    let first = lc::session_name(None);
    assert_eq!(first, format!("{header}000000000001"));
    let second = lc::session_name(Some("job-"));
    assert_eq!(second, format!("job-{header}000000000002"));

    lc::use_prefixed_session_name("edge-");
    let third = lc::session_name(None);
    assert_eq!(third, format!("edge-{header}000000000001"));

    let ctx = lc::Context::session();
    assert_eq!(ctx.name(), format!("edge-{header}000000000002"));
    assert_eq!(ctx.fork().name(), format!("edge-{header}000000000002000000000001"));

    lc::set_session(&ctx, "real-session");
    assert_eq!(lc::real_session(&ctx.fork()).as_deref(), Some("real-session"));
}
