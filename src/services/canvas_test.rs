use tokio::time::sleep;

use super::*;
use crate::backend::memory::MemoryRowStore;
use crate::backend::{BackendError, Filter, ROOMS_TABLE, Record};
use crate::render::{Board, Rgba};
use crate::state::test_helpers::RecordingStore;

const QUIET: Duration = Duration::from_millis(1000);

/// Store whose `update` commits only after a fixed delay.
struct SlowStore {
    inner: Arc<MemoryRowStore>,
    delay: Duration,
}

#[async_trait::async_trait]
impl RowStore for SlowStore {
    async fn insert(&self, table: &str, record: Record) -> Result<Vec<Record>, BackendError> {
        self.inner.insert(table, record).await
    }

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        self.inner.select(table, filter).await
    }

    async fn update(&self, table: &str, patch: Record, filter: &Filter) -> Result<(), BackendError> {
        sleep(self.delay).await;
        self.inner.update(table, patch, filter).await
    }

    async fn subscribe(&self, table: &str, filter: Filter) -> Result<mpsc::Receiver<Change>, BackendError> {
        self.inner.subscribe(table, filter).await
    }
}

fn canvas_with(store: Arc<dyn RowStore>) -> (CanvasSync, Arc<Board>, SessionScope) {
    let board = Arc::new(Board::new(64, 48));
    let scope = SessionScope::new();
    let canvas = CanvasSync::new(Uuid::new_v4(), board.clone(), store, scope.clone(), QUIET);
    (canvas, board, scope)
}

fn written_bitmap(store: &RecordingStore) -> Bitmap {
    let patch = store.last_update().expect("a write happened");
    let url = patch["drawing"].as_str().expect("drawing is a data url");
    Snapshot::from_data_url(url).decode().expect("written snapshot decodes")
}

fn pen(size: f64, color: &str) -> DrawingPen {
    DrawingPen { size, color: color.to_owned() }
}

/// Draw a short horizontal stroke at row `y`.
fn stroke(canvas: &CanvasSync, y: f64) {
    canvas.pointer_down(Point::new(4.0, y));
    canvas.pointer_move(Point::new(20.0, y));
    canvas.pointer_move(Point::new(40.0, y));
    canvas.pointer_up();
}

// =============================================================================
// DEBOUNCED PERSISTENCE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn burst_within_quiet_interval_writes_once_with_final_state() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, board, _scope) = canvas_with(store.clone());

    canvas.pointer_down(Point::new(2.0, 10.0));
    for i in 1..=10 {
        canvas.pointer_move(Point::new(2.0 + f64::from(i) * 5.0, 10.0 + f64::from(i)));
        sleep(Duration::from_millis(300)).await;
    }
    canvas.pointer_up();
    assert_eq!(store.update_count(), 0, "no write while the stroke keeps moving");

    sleep(Duration::from_millis(600)).await;
    assert_eq!(store.update_count(), 0, "quiet interval measured from the last segment");

    sleep(Duration::from_millis(500)).await;
    assert_eq!(store.update_count(), 1);
    assert_eq!(written_bitmap(&store), board.snapshot());
    assert!(!canvas.is_write_pending());
}

#[tokio::test(start_paused = true)]
async fn two_pauses_write_twice() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, board, _scope) = canvas_with(store.clone());

    stroke(&canvas, 10.0);
    sleep(QUIET + Duration::from_millis(200)).await;
    assert_eq!(store.update_count(), 1);

    stroke(&canvas, 30.0);
    sleep(QUIET + Duration::from_millis(200)).await;
    assert_eq!(store.update_count(), 2);
    assert_eq!(written_bitmap(&store), board.snapshot());
}

#[tokio::test(start_paused = true)]
async fn timer_keeps_running_after_pointer_up() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, _board, _scope) = canvas_with(store.clone());

    stroke(&canvas, 10.0);
    assert_eq!(canvas.gesture(), Gesture::Idle);
    assert!(canvas.is_write_pending());

    sleep(QUIET + Duration::from_millis(10)).await;
    assert_eq!(store.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_moves_neither_draw_nor_write() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, board, _scope) = canvas_with(store.clone());

    for i in 0..5 {
        canvas.pointer_move(Point::new(f64::from(i) * 10.0, 20.0));
    }
    assert!(board.snapshot().is_blank());
    assert!(!canvas.is_write_pending());

    sleep(QUIET * 2).await;
    assert_eq!(store.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stroke_starts_at_pointer_down_sample() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, board, _scope) = canvas_with(store);
    canvas.set_origin(Point::new(100.0, 100.0));

    canvas.pointer_move(Point::new(100.0, 100.0));
    canvas.pointer_down(Point::new(110.0, 120.0));
    canvas.pointer_move(Point::new(130.0, 120.0));

    let bmp = board.snapshot();
    assert_eq!(bmp.pixel(20, 20), Some(Rgba::BLACK));
    assert_eq!(bmp.pixel(1, 1), Some(Rgba::TRANSPARENT), "no segment from the idle sample");
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_dropped_not_retried() {
    let store = Arc::new(RecordingStore::failing());
    let (canvas, _board, _scope) = canvas_with(store.clone());

    stroke(&canvas, 10.0);
    sleep(QUIET * 5).await;
    assert_eq!(store.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn leaving_abandons_pending_write() {
    let store = Arc::new(RecordingStore::new());
    let (canvas, _board, scope) = canvas_with(store.clone());

    stroke(&canvas, 10.0);
    scope.cancel();
    sleep(QUIET * 3).await;
    assert_eq!(store.update_count(), 0);
}

// =============================================================================
// PEN
// =============================================================================

#[tokio::test]
async fn pen_change_affects_only_later_strokes() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));

    canvas.set_pen(pen(3.0, "#ff0000"));
    stroke(&canvas, 10.0);
    canvas.set_pen(pen(3.0, "#00ff00"));
    stroke(&canvas, 30.0);

    let bmp = board.snapshot();
    assert_eq!(bmp.pixel(20, 10), Some(Rgba([255, 0, 0, 255])));
    assert_eq!(bmp.pixel(20, 30), Some(Rgba([0, 255, 0, 255])));
    assert_eq!(canvas.pen(), pen(3.0, "#00ff00"));
}

#[tokio::test]
async fn unparsable_pen_color_keeps_previous_color() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));

    canvas.set_pen(pen(3.0, "#0000ff"));
    canvas.set_pen(pen(3.0, "not-a-color"));
    stroke(&canvas, 10.0);

    assert_eq!(board.snapshot().pixel(20, 10), Some(Rgba([0, 0, 255, 255])));
}

// =============================================================================
// LOAD AND REMOTE UPDATES
// =============================================================================

#[tokio::test]
async fn stored_snapshot_reloads_pixel_for_pixel() {
    let source = Board::new(64, 48);
    source.set_pen(&pen(6.0, "#336699"));
    source.draw_segment(Point::new(5.0, 5.0), Point::new(50.0, 40.0));
    let original = source.snapshot();
    let snapshot = Snapshot::encode(&original).expect("encode");

    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));
    assert!(canvas.load(Some(&snapshot)));
    assert_eq!(board.snapshot(), original);
}

#[tokio::test]
async fn missing_snapshot_leaves_blank_canvas() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));
    assert!(canvas.load(None));
    assert!(board.snapshot().is_blank());
}

#[tokio::test]
async fn unreadable_snapshot_leaves_blank_canvas() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));
    let garbage = Snapshot::from_data_url("data:image/png;base64,bm90IGEgcG5n");
    assert!(!canvas.load(Some(&garbage)));
    assert!(board.snapshot().is_blank());
}

#[tokio::test(start_paused = true)]
async fn remote_snapshot_replaces_local_content() {
    let store = Arc::new(MemoryRowStore::new());
    let room = room::create_room(store.as_ref(), "shared", Uuid::new_v4(), true)
        .await
        .expect("create room");

    let board = Arc::new(Board::new(64, 48));
    let scope = SessionScope::new();
    let canvas = CanvasSync::new(room.id, board.clone(), store.clone(), scope.clone(), QUIET);
    let changes = store
        .subscribe(ROOMS_TABLE, Filter::new().eq("id", room.id.to_string()))
        .await
        .expect("subscribe");
    canvas.spawn_remote_listener(changes);

    stroke(&canvas, 10.0);

    let remote = Board::new(64, 48);
    remote.set_pen(&pen(4.0, "#ff00ff"));
    remote.draw_segment(Point::new(30.0, 0.0), Point::new(30.0, 48.0));
    let remote_bitmap = remote.snapshot();
    let snapshot = Snapshot::encode(&remote_bitmap).expect("encode");
    room::update_room_drawing(store.as_ref(), room.id, &snapshot)
        .await
        .expect("remote write");

    sleep(Duration::from_millis(10)).await;
    assert_eq!(board.snapshot(), remote_bitmap);
    scope.cancel();
}

#[tokio::test]
async fn own_write_echo_is_ignored() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));
    let echoed = Snapshot::encode(&Bitmap::new(64, 48)).expect("encode");
    *lock(&canvas.inner.last_written) = Some(echoed.clone());

    stroke(&canvas, 10.0);
    let before = board.snapshot();
    canvas.apply_snapshot(&echoed);
    assert_eq!(board.snapshot(), before);
}

#[tokio::test]
async fn own_echo_after_foreign_write_is_redrawn() {
    let (canvas, board, _scope) = canvas_with(Arc::new(RecordingStore::new()));
    let mine = Board::new(64, 48);
    mine.draw_segment(Point::new(0.0, 10.0), Point::new(64.0, 10.0));
    let mine = Snapshot::encode(&mine.snapshot()).expect("encode");
    let theirs = Snapshot::encode(&Bitmap::new(64, 48)).expect("encode");
    *lock(&canvas.inner.last_written) = Some(mine.clone());

    canvas.apply_snapshot(&theirs);
    assert!(board.snapshot().is_blank());
    canvas.apply_snapshot(&mine);
    assert_eq!(board.snapshot(), mine.decode().expect("decode"));
}

#[tokio::test(start_paused = true)]
async fn canvas_matches_store_when_peer_write_lands_mid_flight() {
    let inner = Arc::new(MemoryRowStore::new());
    let room = room::create_room(inner.as_ref(), "shared", Uuid::new_v4(), true)
        .await
        .expect("create room");
    let slow = Arc::new(SlowStore { inner: inner.clone(), delay: Duration::from_millis(50) });

    let board = Arc::new(Board::new(64, 48));
    let scope = SessionScope::new();
    let canvas = CanvasSync::new(room.id, board.clone(), slow, scope.clone(), QUIET);
    let changes = inner
        .subscribe(ROOMS_TABLE, Filter::new().eq("id", room.id.to_string()))
        .await
        .expect("subscribe");
    canvas.spawn_remote_listener(changes);

    // Our write fires at QUIET and commits 50 ms later.
    stroke(&canvas, 10.0);
    sleep(QUIET + Duration::from_millis(10)).await;

    // A peer commits in between.
    let peer = Board::new(64, 48);
    peer.set_pen(&pen(4.0, "#ff00ff"));
    peer.draw_segment(Point::new(30.0, 0.0), Point::new(30.0, 48.0));
    let peer_snapshot = Snapshot::encode(&peer.snapshot()).expect("encode");
    room::update_room_drawing(inner.as_ref(), room.id, &peer_snapshot)
        .await
        .expect("peer write");

    sleep(Duration::from_millis(100)).await;
    let stored = room::fetch_room(inner.as_ref(), room.id)
        .await
        .expect("fetch")
        .drawing
        .expect("drawing stored");
    assert_ne!(stored, peer_snapshot, "our write committed last");
    assert_eq!(board.snapshot(), stored.decode().expect("decode"));
    scope.cancel();
}
