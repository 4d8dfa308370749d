//! End-to-end planner scenarios over the in-memory store.
//!
//! Each test drives the full command path: schedule, persist, tick,
//! transition, reload. The manual clock keeps every scenario
//! deterministic.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dayflow_core::{
    BlockStatus, EngineError, Event, ManualClock, MemoryStore, Planner, PlannerStore, TimeBlock,
    TransitionAction, UnpluggedWindow, WallTime,
};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 13).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    WallTime::new(hour, minute).unwrap().on_date(day())
}

fn wall(s: &str) -> WallTime {
    WallTime::parse(s).unwrap()
}

async fn open_planner(store: &Arc<MemoryStore>, start: DateTime<Utc>) -> (Planner, ManualClock) {
    let clock = ManualClock::at(start);
    let planner = Planner::open(store.clone(), Arc::new(clock.clone()), "ws-1")
        .await
        .unwrap();
    (planner, clock)
}

fn block_by_title<'a>(blocks: &'a [TimeBlock], title: &str) -> &'a TimeBlock {
    blocks
        .iter()
        .find(|b| b.title == title)
        .unwrap_or_else(|| panic!("no block titled '{title}'"))
}

fn assert_at_most_one_now(blocks: &[TimeBlock]) {
    let count = blocks
        .iter()
        .filter(|b| b.status == BlockStatus::Now)
        .count();
    assert!(count <= 1, "{count} blocks are NOW");
}

#[tokio::test]
async fn schedule_routes_around_unplugged_window() {
    let store = Arc::new(MemoryStore::new());
    store
        .save_unplugged_windows(
            "ws-1",
            &[UnpluggedWindow::new("break", wall("14:30"), wall("15:00")).unwrap()],
        )
        .await
        .unwrap();

    let (planner, _clock) = open_planner(&store, at(14, 0)).await;
    let task = planner
        .create_task("Write report", 90, None, false)
        .await
        .unwrap();
    let update = planner.move_to_timeline(&task.id).await.unwrap();

    // 90 minutes at 14:00 with a 14:30-15:00 window: 30 + 60.
    assert_eq!(update.blocks.len(), 2);
    assert_eq!(update.blocks[0].start_time, at(14, 0));
    assert_eq!(update.blocks[0].end_time, at(14, 30));
    assert_eq!(update.blocks[1].start_time, at(15, 0));
    assert_eq!(update.blocks[1].end_time, at(16, 0));
    let total: i64 = update.blocks.iter().map(|b| b.duration_minutes()).sum();
    assert_eq!(total, 90);

    // The rendered view interleaves the unplugged placeholder.
    let view = planner.timeline_view().await;
    assert_eq!(view.len(), 3);
    assert_eq!(view[1].status, BlockStatus::Unplugged);
    assert_eq!(view[1].start_time, at(14, 30));
}

#[tokio::test]
async fn overrun_block_is_flagged_pending_not_completed() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let task = planner.create_task("Deep work", 60, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();

    let update = planner.tick().await.unwrap();
    assert!(matches!(update.events[0], Event::BlockPromoted { .. }));
    let block_id = block_by_title(&update.blocks, "Deep work").id.clone();

    // 11:05 tick: the 10:00-11:00 block overran five minutes ago.
    clock.set(at(11, 5));
    let update = planner.tick().await.unwrap();
    assert!(matches!(update.events[0], Event::BlockOverrun { .. }));

    let flagged = block_by_title(&update.blocks, "Deep work");
    assert_eq!(flagged.status, BlockStatus::Pending);
    assert_eq!(flagged.end_time, at(11, 0));

    // The stored status matches the in-memory one.
    let stored = store.load_ledger("ws-1", day()).await.unwrap();
    assert_eq!(stored[0].status, BlockStatus::Pending);
    assert_eq!(stored[0].id, block_id);
}

#[tokio::test]
async fn delay_shifts_pending_block_and_every_following_will() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    for (title, minutes) in [("A", 60u32), ("B", 60), ("C", 30)] {
        let task = planner.create_task(title, minutes, None, false).await.unwrap();
        planner.move_to_timeline(&task.id).await.unwrap();
    }
    planner.tick().await.unwrap();

    clock.set(at(11, 5));
    planner.tick().await.unwrap();
    let blocks = planner.ledger().await;
    let a_id = block_by_title(&blocks, "A").id.clone();

    let update = planner
        .transition(&a_id, TransitionAction::Delay { minutes: 15 }, None)
        .await
        .unwrap();

    let a = block_by_title(&update.blocks, "A");
    let b = block_by_title(&update.blocks, "B");
    let c = block_by_title(&update.blocks, "C");
    assert_eq!(a.status, BlockStatus::Will);
    assert_eq!(a.start_time, at(10, 15));
    assert_eq!(b.start_time, at(11, 15));
    assert_eq!(c.start_time, at(12, 15));
    // Relative gaps survive the shift.
    assert_eq!(b.end_time, at(12, 15));
    assert_at_most_one_now(&update.blocks);
}

#[tokio::test]
async fn complete_now_discards_remainder_and_promotion_waits() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let a = planner.create_task("A", 60, None, false).await.unwrap();
    let b = planner.create_task("B", 30, None, false).await.unwrap();
    planner.move_to_timeline(&a.id).await.unwrap();
    planner.move_to_timeline(&b.id).await.unwrap();
    planner.tick().await.unwrap();

    clock.set(at(10, 40));
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();
    let update = planner
        .transition(&a_id, TransitionAction::CompleteNow, Some("done early".into()))
        .await
        .unwrap();

    let done = block_by_title(&update.blocks, "A");
    assert_eq!(done.status, BlockStatus::Done);
    assert_eq!(done.end_time, at(10, 40));
    assert_eq!(done.review_memo.as_deref(), Some("done early"));
    // The 20 unused minutes are not rescheduled anywhere.
    let b_block = block_by_title(&update.blocks, "B");
    assert_eq!(b_block.status, BlockStatus::Will);
    assert_eq!(b_block.start_time, at(11, 0));

    // B's start has not arrived; nothing is current until it does.
    assert_at_most_one_now(&update.blocks);
    assert!(update.blocks.iter().all(|x| x.status != BlockStatus::Now));

    clock.set(at(11, 0));
    let update = planner.tick().await.unwrap();
    assert_eq!(
        block_by_title(&update.blocks, "B").status,
        BlockStatus::Now
    );
}

#[tokio::test]
async fn complete_ago_is_bounded_by_the_block_start() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let task = planner.create_task("A", 60, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();
    planner.tick().await.unwrap();
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();

    // 10:20 minus 30 minutes falls before the 10:00 start.
    clock.set(at(10, 20));
    let err = planner
        .transition(&a_id, TransitionAction::CompleteAgo { minutes: 30 }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDuration(_)));
    assert_eq!(
        block_by_title(&planner.ledger().await, "A").status,
        BlockStatus::Now
    );

    clock.set(at(11, 20));
    let update = planner
        .transition(&a_id, TransitionAction::CompleteAgo { minutes: 10 }, None)
        .await
        .unwrap();
    assert_eq!(block_by_title(&update.blocks, "A").end_time, at(11, 10));
}

#[tokio::test]
async fn completion_promotes_the_next_due_block() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let a = planner.create_task("A", 30, None, false).await.unwrap();
    let b = planner.create_task("B", 30, None, false).await.unwrap();
    planner.move_to_timeline(&a.id).await.unwrap();
    planner.move_to_timeline(&b.id).await.unwrap();
    planner.tick().await.unwrap();

    // At 10:35 block B (10:30 start) is already due when A completes.
    clock.set(at(10, 35));
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();
    let update = planner
        .transition(&a_id, TransitionAction::CompleteOnTime, None)
        .await
        .unwrap();

    let a_block = block_by_title(&update.blocks, "A");
    assert_eq!(a_block.status, BlockStatus::Done);
    assert_eq!(a_block.end_time, at(10, 30));
    assert_eq!(
        block_by_title(&update.blocks, "B").status,
        BlockStatus::Now
    );
    assert!(update
        .events
        .iter()
        .any(|e| matches!(e, Event::BlockPromoted { .. })));
    assert_at_most_one_now(&update.blocks);
}

#[tokio::test]
async fn double_submission_reports_already_resolved() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let task = planner.create_task("A", 30, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();
    planner.tick().await.unwrap();
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();

    clock.set(at(10, 20));
    planner
        .transition(&a_id, TransitionAction::CompleteNow, None)
        .await
        .unwrap();
    let err = planner
        .transition(&a_id, TransitionAction::CompleteNow, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyResolved { .. }));
}

#[tokio::test]
async fn reorder_round_trips_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let (planner, _clock) = open_planner(&store, at(9, 0)).await;

    let a = planner.create_task("A", 30, None, false).await.unwrap();
    let b = planner.create_task("B", 45, None, false).await.unwrap();
    planner.move_to_timeline(&a.id).await.unwrap();
    planner.move_to_timeline(&b.id).await.unwrap();

    let blocks = planner.ledger().await;
    let a_id = block_by_title(&blocks, "A").id.clone();
    let b_id = block_by_title(&blocks, "B").id.clone();

    let update = planner
        .reorder(&[b_id.clone(), a_id.clone()])
        .await
        .unwrap();
    assert_eq!(update.blocks[0].id, b_id);
    assert_eq!(update.blocks[1].id, a_id);
    // B is re-timed to the front, A packed after it.
    assert_eq!(update.blocks[0].start_time, at(9, 0));
    assert_eq!(update.blocks[1].start_time, at(9, 45));

    // A fresh planner over the same store sees the persisted order: no
    // drops, no duplicates.
    let (reopened, _clock) = open_planner(&store, at(9, 0)).await;
    let reloaded = reopened.ledger().await;
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].id, b_id);
    assert_eq!(reloaded[1].id, a_id);
}

#[tokio::test]
async fn invalid_reorder_leaves_the_ledger_untouched() {
    let store = Arc::new(MemoryStore::new());
    let (planner, _clock) = open_planner(&store, at(9, 0)).await;

    let a = planner.create_task("A", 30, None, false).await.unwrap();
    let b = planner.create_task("B", 30, None, false).await.unwrap();
    planner.move_to_timeline(&a.id).await.unwrap();
    planner.move_to_timeline(&b.id).await.unwrap();

    let before = planner.ledger().await;
    let a_id = block_by_title(&before, "A").id.clone();

    // Dropped id.
    let err = planner.reorder(&[a_id]).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidReorder(_)));

    let after = planner.ledger().await;
    assert_eq!(after.len(), before.len());
    for (x, y) in before.iter().zip(&after) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.start_time, y.start_time);
    }
}

#[tokio::test]
async fn persistence_failure_triggers_a_full_reload() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let task = planner.create_task("A", 60, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();
    planner.tick().await.unwrap();
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();

    clock.set(at(10, 30));
    store.fail_next_write();
    let err = planner
        .transition(&a_id, TransitionAction::CompleteNow, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));

    // The optimistic completion was rolled back to the stored state.
    let reloaded = block_by_title(&planner.ledger().await, "A").clone();
    assert_eq!(reloaded.status, BlockStatus::Now);
    assert_eq!(reloaded.end_time, at(11, 0));

    // The next submission goes through.
    let update = planner
        .transition(&a_id, TransitionAction::CompleteNow, None)
        .await
        .unwrap();
    assert_eq!(block_by_title(&update.blocks, "A").status, BlockStatus::Done);
}

#[tokio::test]
async fn interrupt_splits_the_current_block() {
    let store = Arc::new(MemoryStore::new());
    let (planner, clock) = open_planner(&store, at(10, 0)).await;

    let task = planner.create_task("A", 60, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();
    planner.tick().await.unwrap();
    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();

    clock.set(at(10, 25));
    let update = planner.interrupt(&a_id).await.unwrap();
    assert!(matches!(update.events[0], Event::BlockSplit { .. }));

    assert_eq!(update.blocks.len(), 2);
    let prefix = &update.blocks[0];
    let residual = &update.blocks[1];
    assert_eq!(prefix.status, BlockStatus::Done);
    assert_eq!(prefix.end_time, at(10, 25));
    assert_eq!(prefix.split_index, Some(0));
    assert_eq!(residual.status, BlockStatus::Pending);
    assert_eq!(residual.duration_minutes(), 35);
    assert_eq!(residual.split_index, Some(1));
    assert_eq!(residual.task_id, prefix.task_id);

    // Both halves are durable.
    let stored = store.load_ledger("ws-1", day()).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn move_to_inbox_returns_the_task() {
    let store = Arc::new(MemoryStore::new());
    let (planner, _clock) = open_planner(&store, at(9, 0)).await;

    let task = planner.create_task("A", 30, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();
    assert!(planner.inbox().await.unwrap().is_empty());

    let a_id = block_by_title(&planner.ledger().await, "A").id.clone();
    let update = planner.move_to_inbox(&a_id).await.unwrap();
    assert!(update.blocks.is_empty());
    assert!(matches!(
        &update.events[0],
        Event::BlockReturnedToInbox {
            task_fully_returned: true,
            ..
        }
    ));

    let inbox = planner.inbox().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, task.id);
}

#[tokio::test]
async fn delete_task_cascades_to_its_blocks() {
    let store = Arc::new(MemoryStore::new());
    let (planner, _clock) = open_planner(&store, at(9, 0)).await;

    let task = planner.create_task("A", 30, None, false).await.unwrap();
    planner.move_to_timeline(&task.id).await.unwrap();

    let update = planner.delete_task(&task.id).await.unwrap();
    assert!(update.blocks.is_empty());
    assert!(store.load_ledger("ws-1", day()).await.unwrap().is_empty());
    assert!(store.get_task(&task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn a_full_day_never_has_two_current_blocks() {
    let store = Arc::new(MemoryStore::new());
    store
        .save_unplugged_windows(
            "ws-1",
            &[UnpluggedWindow::new("lunch", wall("12:00"), wall("13:00")).unwrap()],
        )
        .await
        .unwrap();
    let (planner, clock) = open_planner(&store, at(9, 0)).await;

    for (title, minutes) in [("mail", 30u32), ("draft", 90), ("review", 45)] {
        let task = planner.create_task(title, minutes, None, false).await.unwrap();
        let update = planner.move_to_timeline(&task.id).await.unwrap();
        assert_at_most_one_now(&update.blocks);
    }

    // Sweep the day in 20-minute ticks, resolving whatever turns pending.
    for step in 0..24 {
        clock.set(at(9, 0) + chrono::Duration::minutes(step * 20));
        let update = planner.tick().await.unwrap();
        assert_at_most_one_now(&update.blocks);

        let pending = update
            .blocks
            .iter()
            .find(|b| b.status == BlockStatus::Pending)
            .map(|b| b.id.clone());
        if let Some(id) = pending {
            let update = planner
                .transition(&id, TransitionAction::CompleteOnTime, None)
                .await
                .unwrap();
            assert_at_most_one_now(&update.blocks);
        }
    }

    // Everything scheduled for the day ended up resolved.
    let blocks = planner.ledger().await;
    assert!(blocks
        .iter()
        .all(|b| matches!(b.status, BlockStatus::Done | BlockStatus::Will)));
}
