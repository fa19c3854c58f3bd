mod common;

use std::time::{Duration, Instant};

use common::{data, harness, png, FetchMode, MemoryStore, ScriptedFetcher};
use icy_carousel::error::LoadError;
use icy_carousel::loader::LoadStart;
use icy_carousel::model::{CarouselData, CarouselSource, CategoryDimensions, ImageRecord};
use icy_carousel::scheduler::ScheduledTask;
use icy_carousel::surface::RenderSurface;
use icy_carousel::texture::fallback_key;
use icy_carousel::viewport::visible_indices;
use icy_carousel::{CarouselEvent, CarouselKey, CarouselOptions};

const WAIT: Duration = Duration::from_secs(5);

fn remote(_: &str, k: usize) -> String {
    format!("https://images.example.com/poster{k}.jpg")
}

#[test]
fn local_images_load_synchronously() {
    let store = MemoryStore::with_files(&[":/a0.png", ":/a1.png"]);
    let mut h = harness(CarouselOptions::default(), store, ScriptedFetcher::new(FetchMode::Fail));
    h.carousel.set_data(data(&["a"], 2, |c, k| format!(":/{c}{k}.png")), Instant::now());

    let scene = h.carousel.scene();
    for index in 0..2 {
        let entry = scene.entry(index).unwrap();
        assert!(entry.texture.is_some());
        assert!(!entry.is_fallback);
    }
    assert_eq!(h.surface.render_frame(scene.as_ref()).nodes_drawn, 2);
}

#[test]
fn missing_local_file_shows_placeholder() {
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), ScriptedFetcher::new(FetchMode::Fail));
    h.carousel.set_data(data(&["a"], 1, |_, _| ":/missing.png".to_string()), Instant::now());

    let entry = h.carousel.scene().entry(0).unwrap();
    assert!(entry.is_fallback);
    assert!(h.carousel.cache().contains(&fallback_key(0)));
    let texture = entry.texture.unwrap();
    assert_eq!((texture.width, texture.height), (280, 180));
}

#[test]
fn unsupported_reference_shows_placeholder() {
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), ScriptedFetcher::new(FetchMode::Fail));
    h.carousel.set_data(data(&["a"], 2, |_, k| if k == 0 { String::new() } else { "gopher://example.com/a.png".to_string() }), Instant::now());

    let scene = h.carousel.scene();
    assert!(scene.entry(0).unwrap().is_fallback);
    assert!(scene.entry(1).unwrap().is_fallback);
    assert_eq!(h.carousel.loader().pending_count(), 0);
}

#[test]
fn remote_image_is_scaled_to_poster_size() {
    let fetcher = ScriptedFetcher::new(FetchMode::Serve(png(560, 360)));
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), fetcher.clone());
    h.carousel.set_data(data(&["web"], 1, remote), Instant::now());
    assert_eq!(h.carousel.loader().pending_count(), 1);

    assert_eq!(h.carousel.wait_for_loads(WAIT), 1);
    let entry = h.carousel.scene().entry(0).unwrap();
    assert!(!entry.is_fallback);
    let texture = entry.texture.unwrap();
    let pixels = h.surface.texture(texture.id).unwrap();
    assert_eq!((pixels.width, pixels.height), (280, 180));
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn second_request_for_same_item_supersedes_first() {
    let fetcher = ScriptedFetcher::gated(FetchMode::Serve(png(8, 8)));
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), fetcher.clone());
    h.carousel.set_data(data(&["web"], 1, remote), Instant::now());
    let first = h.carousel.loader().pending_request(0).unwrap();

    let record = h.carousel.data().record(0).unwrap().clone();
    let LoadStart::Pending(second) = h.carousel.loader().load(0, &record, (280, 180)) else {
        panic!("expected a new request");
    };
    assert_ne!(first, second);
    assert_eq!(h.carousel.loader().pending_count(), 1);

    fetcher.open();
    assert_eq!(h.carousel.wait_for_loads(WAIT), 1);
    assert_eq!(h.carousel.loader().pending_count(), 0);
    assert!(h.carousel.scene().has_resource(0));
    assert_eq!(h.carousel.tick(Instant::now()), 0);
}

#[test]
fn repeated_failures_reuse_one_placeholder() {
    let fetcher = ScriptedFetcher::new(FetchMode::Fail);
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), fetcher.clone());
    let now = Instant::now();
    h.carousel.set_data(data(&["web"], 1, remote), now);
    h.carousel.wait_for_loads(WAIT);

    let scene = h.carousel.scene();
    let first = scene.entry(0).unwrap();
    assert!(first.is_fallback);
    let textures = h.surface.texture_count();

    scene.clear_resource(0);
    assert!(matches!(h.carousel.load(0, now), LoadStart::Pending(_)));
    h.carousel.wait_for_loads(WAIT);

    let second = scene.entry(0).unwrap();
    assert!(second.is_fallback);
    assert_eq!(second.texture, first.texture);
    assert_eq!(h.surface.texture_count(), textures);
    assert_eq!(fetcher.calls(), 2);
}

#[test]
fn slow_server_times_out_into_placeholder() {
    let mut options = CarouselOptions::default();
    options.fetch.timeout_ms = 50;
    let mut h = harness(options, MemoryStore::with_files(&[]), ScriptedFetcher::new(FetchMode::Hang));
    h.carousel.set_data(data(&["web"], 1, remote), Instant::now());

    assert_eq!(h.carousel.wait_for_loads(WAIT), 1);
    assert!(h.carousel.scene().entry(0).unwrap().is_fallback);
    assert_eq!(h.carousel.loader().pending_count(), 0);
}

#[test]
fn loads_wait_for_a_ready_surface() {
    let store = MemoryStore::with_files(&[":/a0.png"]);
    let mut h = harness(CarouselOptions::default(), store, ScriptedFetcher::new(FetchMode::Fail));
    h.surface.set_ready(false);
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 1, |c, k| format!(":/{c}{k}.png")), start);
    assert!(!h.carousel.scene().has_resource(0));
    assert_eq!(h.carousel.timers().len(), 1);

    h.surface.set_ready(true);
    h.carousel.tick(start + Duration::from_millis(50));
    assert!(!h.carousel.scene().has_resource(0));
    h.carousel.tick(start + Duration::from_millis(100));
    assert!(h.carousel.scene().has_resource(0));
}

#[test]
fn offscreen_items_are_staggered() {
    let names: Vec<String> = (0..8).map(|k| format!(":/a{k}.png")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 8, |c, k| format!(":/{c}{k}.png")), start);

    // 900 wide: items 0-3 are visible, 4-7 follow at 50 ms steps
    let scene = h.carousel.scene();
    assert!((0..4).all(|index| scene.has_resource(index)));
    assert!((4..8).all(|index| !scene.has_resource(index)));

    h.carousel.tick(start + Duration::from_millis(100));
    assert!(scene.has_resource(4) && scene.has_resource(5));
    assert!(!scene.has_resource(6));

    h.carousel.tick(start + Duration::from_millis(200));
    assert!((0..8).all(|index| scene.has_resource(index)));
}

#[test]
fn navigation_emits_events_and_animates() {
    let names: Vec<String> = ["a", "b"].iter().flat_map(|c| (0..6).map(move |k| format!(":/{c}{k}.png"))).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a", "b"], 6, |c, k| format!(":/{c}{k}.png")), start);

    assert!(h.carousel.handle_key(CarouselKey::Right, start));
    assert_eq!(h.carousel.selection().current, Some(0));
    assert!(!h.carousel.handle_key(CarouselKey::Left, start));

    for _ in 0..4 {
        assert!(h.carousel.handle_key(CarouselKey::Right, start));
    }
    assert_eq!(h.carousel.selection().current, Some(4));
    assert!(h.carousel.animator().horizontal("a").is_some());

    h.carousel.tick(start + Duration::from_millis(400));
    assert!(!h.carousel.animator().is_animating());
    // 4 * 300 - (900 - 280) / 2
    assert!((h.carousel.viewport().category_offset("a") - 890.0).abs() < 0.001);

    assert!(h.carousel.handle_key(CarouselKey::Ok, start));
    let events = h.carousel.take_events();
    assert_eq!(events.len(), 6);
    assert!(matches!(&events[0], CarouselEvent::SelectionChanged { index: 0, grid: Some((0, 0)), .. }));
    let CarouselEvent::LinkActivated { action, record } = &events[5] else {
        panic!("expected an activation");
    };
    assert_eq!(action, "OK");
    assert_eq!(record.title, "a 4");
}

#[test]
fn empty_data_falls_back_to_test_items() {
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), ScriptedFetcher::new(FetchMode::Fail));
    h.carousel.set_data(data(&[], 0, |_, _| String::new()), Instant::now());
    assert_eq!(h.carousel.data().len(), 5);
    assert_eq!(h.carousel.data().categories()[0].name, "Test Items");
}

#[test]
fn evicted_texture_is_reloaded_on_next_tick() {
    let names: Vec<String> = (0..4).map(|k| format!(":/a{k}.png")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let store = MemoryStore::with_files(&refs);
    let mut h = harness(CarouselOptions::default(), store.clone(), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 4, |c, k| format!(":/{c}{k}.png")), start);
    let scene = h.carousel.scene();
    h.surface.render_frame(scene.as_ref());

    let texture = scene.entry(2).unwrap().texture.unwrap();
    h.surface.release_texture(texture.id);
    h.carousel.cache().release(":/a2.png");

    // the render side notices the missing texture, the next tick queues a reload
    h.carousel.tick(start);
    h.surface.render_frame(scene.as_ref());
    assert!(!scene.has_resource(2));
    h.carousel.tick(start);
    assert!(h.carousel.timers().contains(ScheduledTask::Load(2)));
    h.carousel.tick(start + Duration::from_millis(10));
    assert!(scene.has_resource(2));
    assert_eq!(store.reads(), 5);
}

fn local_row(count: usize) -> Vec<String> {
    (0..count).map(|k| format!(":/a{k}.png")).collect()
}

#[test]
fn small_cache_keeps_visible_items_on_screen() {
    let names = local_row(8);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut options = CarouselOptions::default();
    options.cache_capacity = 4;
    let mut h = harness(options, MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 8, |c, k| format!(":/{c}{k}.png")), start);
    let scene = h.carousel.scene();

    for step in 0..40u64 {
        h.carousel.tick(start + Duration::from_millis(50 * step));
        assert_eq!(h.surface.render_frame(scene.as_ref()).nodes_drawn, 4, "frame {step}");
    }
    assert!((0..4).all(|index| scene.has_resource(index)));
    assert!(h.carousel.cache().len() <= 4);
}

#[test]
fn evicted_visible_items_come_back_without_input() {
    let names = local_row(8);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut options = CarouselOptions::default();
    options.cache_capacity = 4;
    let mut h = harness(options, MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 8, |c, k| format!(":/{c}{k}.png")), start);
    let scene = h.carousel.scene();
    h.surface.render_frame(scene.as_ref());

    // an offscreen load pushes item 0 out of the cache
    let record = h.carousel.data().record(6).unwrap().clone();
    assert!(matches!(h.carousel.loader().load(6, &record, (280, 180)), LoadStart::Ready(_)));
    assert!(!h.carousel.cache().contains(":/a0.png"));

    // each reload pushes the next oldest entry out until the offscreen one goes
    let mut now = start;
    for _ in 0..20 {
        now += Duration::from_millis(50);
        h.carousel.tick(now);
        h.surface.render_frame(scene.as_ref());
    }
    assert!((0..4).all(|index| scene.has_resource(index)));
    assert_eq!(h.surface.render_frame(scene.as_ref()).nodes_drawn, 4);
    assert!(h.carousel.timers().is_empty());
}

#[test]
fn items_entering_view_load_during_the_animation() {
    let names = local_row(12);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut options = CarouselOptions::default();
    options.stagger_ms = 10_000;
    let mut h = harness(options, MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 12, |c, k| format!(":/{c}{k}.png")), start);
    let scene = h.carousel.scene();
    assert!(!scene.has_resource(4));

    for _ in 0..5 {
        assert!(h.carousel.handle_key(CarouselKey::Right, start));
    }

    // a third of the way in, items 4 and 5 have scrolled into view
    h.carousel.tick(start + Duration::from_millis(100));
    assert!(h.carousel.timers().contains(ScheduledTask::Load(4)));
    assert!(h.carousel.timers().contains(ScheduledTask::Load(5)));

    h.carousel.tick(start + Duration::from_millis(150));
    assert!(h.carousel.animator().is_animating());
    assert!(scene.has_resource(4));
    assert!(scene.has_resource(5));
}

#[test]
fn resizing_clamps_offsets_and_reloads() {
    let names = local_row(8);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut options = CarouselOptions::default();
    options.stagger_ms = 10_000;
    let mut h = harness(options, MemoryStore::with_files(&refs), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 8, |c, k| format!(":/{c}{k}.png")), start);

    h.carousel.scroll_by(10_000.0, 0.0, start);
    let row_max = h.carousel.layout().rows()[0].max_offset(900.0);
    assert!((h.carousel.viewport().category_offset("a") - row_max).abs() < 0.001);

    h.carousel.set_viewport_size(2000.0, 600.0, start);
    let wide_max = h.carousel.layout().rows()[0].max_offset(2000.0);
    assert!(wide_max < row_max);
    assert!((h.carousel.viewport().category_offset("a") - wide_max).abs() < 0.001);
    assert!(h.carousel.timers().contains(ScheduledTask::LoadAll));

    h.carousel.tick(start + Duration::from_millis(100));
    let visible = visible_indices(h.carousel.viewport(), h.carousel.layout());
    assert!(visible.len() > 4);
    let scene = h.carousel.scene();
    assert!(visible.iter().all(|index| scene.has_resource(*index)));
}

#[test]
fn rebinding_cancels_in_flight_requests() {
    let fetcher = ScriptedFetcher::gated(FetchMode::Serve(png(8, 8)));
    let store = MemoryStore::with_files(&[":/a0.png", ":/a1.png", ":/a2.png"]);
    let mut h = harness(CarouselOptions::default(), store, fetcher.clone());
    let start = Instant::now();
    h.carousel.set_data(data(&["web"], 3, remote), start);
    assert_eq!(h.carousel.loader().pending_count(), 3);

    h.carousel.set_data(data(&["a"], 3, |c, k| format!(":/{c}{k}.png")), start);
    assert_eq!(h.carousel.loader().pending_count(), 0);
    let scene = h.carousel.scene();
    let installed: Vec<_> = (0..3).map(|index| scene.entry(index).unwrap().texture).collect();

    // late completions of the old requests change nothing
    fetcher.open();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(h.carousel.tick(start + Duration::from_millis(100)), 0);
    for (index, texture) in installed.iter().enumerate() {
        let entry = scene.entry(index).unwrap();
        assert_eq!(entry.texture, *texture);
        assert!(!entry.is_fallback);
    }
    assert!(!h.carousel.cache().keys().iter().any(|key| key.starts_with("https://")));
}

#[test]
fn placeholders_do_not_outlive_their_data_set() {
    let mut h = harness(CarouselOptions::default(), MemoryStore::with_files(&[]), ScriptedFetcher::new(FetchMode::Fail));
    let start = Instant::now();
    h.carousel.set_data(data(&["a"], 1, |_, _| ":/missing.png".to_string()), start);
    let old = h.carousel.scene().entry(0).unwrap().texture.unwrap();
    assert_eq!((old.width, old.height), (280, 180));

    let small = CategoryDimensions {
        row_height: 100.0,
        poster_height: 100.0,
        poster_width: 60.0,
        item_spacing: 10.0,
    };
    h.carousel.set_data(
        CarouselData::new(CarouselSource {
            categories: vec!["small".to_string()],
            records: vec![ImageRecord::new(":/missing.png", "tiny", "small")],
            dimensions: [("small".to_string(), small)].into_iter().collect(),
        }),
        start,
    );

    let entry = h.carousel.scene().entry(0).unwrap();
    assert!(entry.is_fallback);
    let texture = entry.texture.unwrap();
    assert_eq!((texture.width, texture.height), (60, 100));
    assert!(!h.surface.has_texture(old.id));
}

#[test]
fn timeout_error_is_reported_as_such() {
    let err = LoadError::Timeout(Duration::from_millis(50));
    assert!(err.wants_fallback());
    assert!(!LoadError::Cancelled.wants_fallback());
}
