//! Render caching through the composed layer: fingerprint validation
//! against live content, invalidation granularity, and the startup flag.

mod common;

use common::{default_bed, seed_project, test_bed};
use vigil::render::RenderedFragment;
use vigil::VigilConfig;

#[test]
fn test_fragment_served_while_content_unchanged() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");

    let fragment = bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>chapter one</article>".to_string())
    });

    let served = bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .expect("content unchanged, cache must serve");
    assert_eq!(served, fragment);
}

#[test]
fn test_edit_invalidates_every_containing_fragment() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");

    for item in ["all", "chapter-1", "chapter-2"] {
        let body = format!("<article>{}</article>", item);
        bed.vigil
            .render_and_store("p1", "web-en", item, || RenderedFragment::html(body));
    }
    assert_eq!(bed.vigil.renders.len(), 3);

    // An editor saves page-1, which lives under chapter-1.
    bed.content.set_digest("p1", "ref-p1", "d-p1-2");

    // Fragments containing the page stop being served, without anyone
    // invalidating them.
    assert!(bed.vigil.cached_fragment("p1", "web-en", "all").is_none());
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_none());

    // chapter-2 does not contain page-1 and keeps serving.
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-2")
        .is_some());

    // Re-rendering brings chapter-1 back.
    bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>chapter one, v2</article>".to_string())
    });
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_some());
}

#[test]
fn test_edit_landing_mid_render_is_not_masked() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");

    // The render reads page-1 as of d-p1-1; the editor saves a new
    // version while the render is still in progress.
    bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        bed.content.set_digest("p1", "ref-p1", "d-p1-2");
        RenderedFragment::html("<article>chapter one, torn</article>".to_string())
    });

    // The stamped fingerprint predates the edit, so the lookup misses
    // instead of serving the torn render.
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_none());

    // Re-rendering from the post-edit content serves normally.
    let fresh = bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>chapter one, v2</article>".to_string())
    });
    assert_eq!(
        bed.vigil.cached_fragment("p1", "web-en", "chapter-1"),
        Some(fresh)
    );
}

#[test]
fn test_variant_invalidation_spares_siblings() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");
    seed_project(&bed, "p1", "web-de");
    seed_project(&bed, "p2", "web-en");

    for (project, variant) in [("p1", "web-en"), ("p1", "web-de"), ("p2", "web-en")] {
        for item in ["chapter-1", "chapter-2"] {
            let body = format!("<article>{}/{}/{}</article>", project, variant, item);
            bed.vigil
                .render_and_store(project, variant, item, || RenderedFragment::html(body));
        }
    }
    assert_eq!(bed.vigil.renders.len(), 6);

    assert_eq!(bed.vigil.renders.invalidate_variant("p1", "web-en"), 2);

    assert!(bed.vigil.cached_fragment("p1", "web-en", "chapter-1").is_none());
    assert!(bed.vigil.cached_fragment("p1", "web-de", "chapter-1").is_some());
    assert!(bed.vigil.cached_fragment("p2", "web-en", "chapter-1").is_some());
}

#[test]
fn test_project_invalidation_spans_variants() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");
    seed_project(&bed, "p1", "web-de");
    seed_project(&bed, "p2", "web-en");

    for (project, variant) in [("p1", "web-en"), ("p1", "web-de"), ("p2", "web-en")] {
        let body = format!("<nav>{}/{}</nav>", project, variant);
        bed.vigil
            .render_and_store(project, variant, "all", || RenderedFragment::html(body));
    }
    assert_eq!(bed.vigil.renders.len(), 3);

    assert_eq!(bed.vigil.renders.invalidate_project("p1"), 2);
    assert!(bed.vigil.cached_fragment("p1", "web-en", "all").is_none());
    assert!(bed.vigil.cached_fragment("p2", "web-en", "all").is_some());
}

#[test]
fn test_missing_digest_blocks_caching_but_not_serving() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");
    bed.content.remove_digest("p1", "ref-p1");

    // The hierarchy references a record the digest index no longer has;
    // the fresh render is served uncached.
    let draft = bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>draft</article>".to_string())
    });
    assert_eq!(
        draft,
        RenderedFragment::html("<article>draft</article>".to_string())
    );
    assert_eq!(bed.vigil.renders.len(), 0);

    // chapter-2 does not reference the broken record and caches fine.
    bed.vigil.render_and_store("p1", "web-en", "chapter-2", || {
        RenderedFragment::html("<article>two</article>".to_string())
    });
    assert_eq!(bed.vigil.renders.len(), 1);
}

#[test]
fn test_source_outage_downgrades_to_miss_without_evicting() {
    let bed = default_bed();
    seed_project(&bed, "p1", "web-en");
    bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>one</article>".to_string())
    });
    assert_eq!(bed.vigil.renders.len(), 1);

    bed.content.set_failing(true);
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_none());

    // The entry survived the outage and serves again afterwards.
    bed.content.set_failing(false);
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_some());
}

#[test]
fn test_disabled_cache_stores_and_serves_nothing() {
    let bed = test_bed(VigilConfig {
        render_cache_enabled: false,
        ..Default::default()
    });
    seed_project(&bed, "p1", "web-en");

    let rendered = bed.vigil.render_and_store("p1", "web-en", "chapter-1", || {
        RenderedFragment::html("<article>one</article>".to_string())
    });
    assert_eq!(
        rendered,
        RenderedFragment::html("<article>one</article>".to_string())
    );
    assert_eq!(bed.vigil.renders.len(), 0);
    assert!(bed
        .vigil
        .cached_fragment("p1", "web-en", "chapter-1")
        .is_none());
}
