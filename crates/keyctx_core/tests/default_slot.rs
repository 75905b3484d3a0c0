//! Process-wide default context slot.
//!
//! The global slot is shared by every test in a binary, so everything that
//! touches it lives in this one test.

use keyctx_core::{Context, ContextOptions};
use keyctx_engine::Encoding;

#[test]
fn global_default_slot() {
    keyctx_testkit::init_tracing();

    let first = Context::get_default().unwrap();
    let again = Context::get_default().unwrap();
    assert!(first.ptr_eq(&again));

    Context::set_default(None);
    let fresh = Context::get_default().unwrap();
    assert!(!fresh.ptr_eq(&first));
    assert!(!first.is_finalized());

    Context::set_default_options(ContextOptions::new().encoding(Encoding::Utf8));
    assert_eq!(Context::default_options().encoding, Some(Encoding::Utf8));
    assert_ne!(fresh.encoding().unwrap(), Encoding::Utf8);

    let created = Context::create(ContextOptions::new()).unwrap();
    assert_eq!(created.encoding().unwrap(), Encoding::Utf8);
    let explicit = Context::create(ContextOptions::new().encoding(Encoding::Sjis)).unwrap();
    assert_eq!(explicit.encoding().unwrap(), Encoding::Sjis);

    let mine = Context::create(ContextOptions::new()).unwrap();
    Context::set_default(Some(mine.clone()));
    assert!(Context::get_default().unwrap().ptr_eq(&mine));

    Context::set_default(None);
    Context::set_default_options(ContextOptions::new());
    assert_eq!(
        Context::get_default().unwrap().encoding().unwrap(),
        Encoding::Default
    );
}
