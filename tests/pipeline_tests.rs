mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{page_url, pipeline, StubSite, BASE, MIB};
use rust_manga_reader::metrics::CacheTier;
use rust_manga_reader::pipeline::{FAILURE, NO_IMAGES, WRONG_USAGE};
use rust_manga_reader::prefs::{PreferenceStore, HTML_MAX_SIZE, PDF_MAX_SIZE};
use rust_manga_reader::Reply;

fn texts(replies: &[Reply]) -> Vec<&str> {
    replies.iter().filter_map(|r| r.text.as_deref()).collect()
}

#[test]
fn test_download_twice_hits_cache_only() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = StubSite::new(calls.clone()).with_pages(&[10, 20, 30]);
    let (pipeline, _) = pipeline(site);
    let chapter_url = format!("{}/chapter/1", BASE);

    let mut first = Vec::new();
    pipeline.download(&chapter_url, None, &mut first);
    // image list plus three pages
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let mut second = Vec::new();
    pipeline.download(&chapter_url, None, &mut second);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(first, second);

    assert_eq!(first.len(), 1);
    let attachment = first[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.filename, "chapter.pdf");
    assert_eq!(first[0].text.as_deref(), Some(format!("{0}\n{0}", chapter_url).as_str()));
    assert_eq!(pipeline.metrics().cache_counters(CacheTier::Blobs).hits, 3);
}

#[test]
fn test_download_splits_into_numbered_parts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = StubSite::new(calls).with_pages(&[4 * MIB, 4 * MIB, 4 * MIB]);
    let (pipeline, prefs) = pipeline(site);
    prefs.set(PDF_MAX_SIZE, &(3 * MIB).to_string(), "alice@example.org");
    let chapter_url = format!("{}/chapter/1", BASE);

    let mut replies = Vec::new();
    pipeline.download(&chapter_url, Some("alice@example.org"), &mut replies);
    assert_eq!(replies.len(), 3);
    for (i, reply) in replies.iter().enumerate() {
        let expected = format!("{} (Part {})\n{}", chapter_url, i + 1, chapter_url);
        assert_eq!(reply.text.as_deref(), Some(expected.as_str()));
        let pdf = String::from_utf8(reply.attachment.as_ref().unwrap().bytes.clone()).unwrap();
        assert!(pdf.ends_with("pages=1"));
    }

    // the plugin default of 10 MiB keeps everything in one part
    let mut replies = Vec::new();
    pipeline.download(&chapter_url, Some("bob@example.org"), &mut replies);
    assert_eq!(replies.len(), 1);
    assert!(String::from_utf8_lossy(&replies[0].attachment.as_ref().unwrap().bytes).ends_with("pages=3"));
}

#[test]
fn test_read_sends_oversized_page_alone() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = StubSite::new(calls).with_pages(&[20]);
    let (pipeline, prefs) = pipeline(site);
    prefs.set(HTML_MAX_SIZE, "10", "carol@example.org");

    let mut replies = Vec::new();
    pipeline.read(&format!("{}/chapter/1", BASE), Some("carol@example.org"), &mut replies);
    assert_eq!(replies.len(), 1);
    let html = replies[0].html.as_deref().unwrap();
    assert_eq!(html.matches("data:image/jpeg;base64,").count(), 1);
    assert!(replies[0].attachment.is_none());
}

#[test]
fn test_download_uses_chapter_name_from_listing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = StubSite::new(calls).with_pages(&[1]);
    let (pipeline, _) = pipeline(site);

    let mut replies = Vec::new();
    pipeline.info(&format!("{}/manga/naruto", BASE), &mut replies);
    let mut replies = Vec::new();
    pipeline.download(&format!("{}/chapter/1", BASE), None, &mut replies);
    assert_eq!(texts(&replies), vec![format!("Chapter 1\n{}/chapter/1", BASE)]);
}

#[test]
fn test_chapter_without_images() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls));
    let mut replies = Vec::new();
    pipeline.download(&format!("{}/chapter/1", BASE), None, &mut replies);
    assert_eq!(texts(&replies), vec![NO_IMAGES]);
}

#[test]
fn test_search_results_and_empty_query() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls.clone()));

    let mut replies = Vec::new();
    pipeline.search(&format!("en {} naruto", BASE), &mut replies);
    assert_eq!(texts(&replies), vec!["Stub Search Results"]);
    assert!(replies[0].html.as_deref().unwrap().contains("Naruto"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // cached
    let mut replies = Vec::new();
    pipeline.search(&format!("en {} naruto", BASE), &mut replies);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut replies = Vec::new();
    pipeline.search(&format!("en {}", BASE), &mut replies);
    assert_eq!(texts(&replies), vec!["❌ No matches found at Stub"]);
    assert!(replies[0].html.is_none());
}

#[test]
fn test_search_usage_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls.clone()));
    for payload in [
        "naruto".to_string(),
        format!("es {} naruto", BASE),
        format!("xx {} naruto", BASE),
        "en https://unrelated.example naruto".to_string(),
    ] {
        let mut replies = Vec::new();
        pipeline.search(&payload, &mut replies);
        assert_eq!(texts(&replies), vec![WRONG_USAGE], "payload {:?}", payload);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_info_after_search_has_name_chapters_and_cover() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls.clone()));
    let mut replies = Vec::new();
    pipeline.search(&format!("en {} naruto", BASE), &mut replies);

    let mut replies = Vec::new();
    pipeline.info(&format!("{}/manga/naruto", BASE), &mut replies);
    assert_eq!(replies.len(), 1);
    let reply = &replies[0];
    assert_eq!(
        reply.text.as_deref(),
        Some(format!("Naruto\n{}/manga/naruto\n\n(2 chapters)", BASE).as_str())
    );
    let html = reply.html.as_deref().unwrap();
    assert!(html.contains("Chapter 2"));
    assert!(html.contains("/download%20"));
    let cover = reply.attachment.as_ref().unwrap();
    assert_eq!(cover.filename, "cover.jpg");
    assert_eq!(cover.bytes, b"cover".to_vec());

    // search, chapters, cover
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let mut replies = Vec::new();
    pipeline.info(&format!("{}/manga/naruto", BASE), &mut replies);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_info_for_unknown_manga_uses_placeholder() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls));
    let mut replies = Vec::new();
    pipeline.info(&format!("{}/manga/other", BASE), &mut replies);
    assert_eq!(
        texts(&replies),
        vec![format!("{}/manga/other\n\n(2 chapters)", BASE)]
    );
    assert!(replies[0].attachment.is_none());
}

#[test]
fn test_site_failure_becomes_generic_reply() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut site = StubSite::new(calls).with_pages(&[1]);
    site.broken = true;
    let (pipeline, _) = pipeline(site);

    let mut replies = Vec::new();
    pipeline.download(&format!("{}/chapter/1", BASE), None, &mut replies);
    assert_eq!(texts(&replies), vec![FAILURE]);
    assert!(!texts(&replies)[0].contains("div.reader"));
    assert_eq!(pipeline.metrics().get_metrics("Stub").unwrap().upstream_failures, 1);
}

#[test]
fn test_site_menu_lists_sites_per_language() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _) = pipeline(StubSite::new(calls));
    let mut replies = Vec::new();
    pipeline.site_menu("one piece", &mut replies);
    assert_eq!(texts(&replies), vec!["🔍 Select a site to search"]);
    let html = replies[0].html.as_deref().unwrap();
    assert!(html.contains("mailto:bot@example.org?body=/search%20en%20https%3A%2F%2Fstub.example%20one%20piece"));

    let mut replies = Vec::new();
    pipeline.site_menu("   ", &mut replies);
    assert!(replies.is_empty());
}

#[test]
fn test_pages_keep_reading_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let site = StubSite::new(calls).with_pages(&[3, 3, 3]);
    let (pipeline, _) = pipeline(site);
    let mut replies = Vec::new();
    pipeline.read(&format!("{}/chapter/1", BASE), None, &mut replies);

    let images = pipeline.cache().metadata.images(&format!("{}/chapter/1", BASE)).unwrap();
    let urls: Vec<String> = images.into_iter().map(|i| i.url).collect();
    assert_eq!(urls, vec![page_url(0), page_url(1), page_url(2)]);
}
