//! End-to-end ordering flows through the public services.

use super::helpers::{Board, board};
use rstest::rstest;
use taskboard::board::services::{CreateStageRequest, CreateTaskRequest, MoveTaskRequest};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn card_travels_across_the_board(board: Board) {
    let mut stages = Vec::new();
    for name in ["Backlog", "Doing", "Done"] {
        stages.push(
            board
                .service
                .create_stage(CreateStageRequest::new(board.project, name))
                .await
                .expect("stage creation should succeed")
                .id(),
        );
    }
    let [backlog, doing, done] = stages.as_slice() else {
        panic!("expected three stages");
    };

    let mut cards = Vec::new();
    for name in ["design", "build", "ship"] {
        cards.push(
            board
                .service
                .create_task(CreateTaskRequest::new(board.project, *backlog, name))
                .await
                .expect("task creation should succeed")
                .id(),
        );
    }
    let [design, build, ship] = cards.as_slice() else {
        panic!("expected three cards");
    };

    board
        .mover
        .move_task(MoveTaskRequest::new(*design, *doing))
        .await
        .expect("move to doing should succeed");
    board
        .mover
        .move_task(MoveTaskRequest::new(*build, *doing).before(*design))
        .await
        .expect("move before design should succeed");
    board
        .mover
        .move_task(MoveTaskRequest::new(*design, *done))
        .await
        .expect("move to done should succeed");

    assert_eq!(board.order(*backlog).await, vec![*ship]);
    assert_eq!(board.order(*doing).await, vec![*build]);
    assert_eq!(board.order(*done).await, vec![*design]);
    let listed = board
        .service
        .list_tasks(*doing)
        .await
        .expect("listing should succeed");
    assert_eq!(listed.first().map(|task| task.position().value()), Some(0));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_front_insertions_survive_gap_exhaustion(board: Board) {
    let (stage, ids) = board.seed(0, 1, &[65_536, 131_072]);
    let [anchor, mover] = ids.as_slice() else {
        panic!("expected two seeded tasks");
    };

    // Each move halves the gap between the anchor and the card after it.
    let mut following = *mover;
    let (_, extra) = board.seed(1, 10, &[65_536; 24]);
    for card in &extra {
        board
            .mover
            .move_task(MoveTaskRequest::new(*card, stage).before(following))
            .await
            .expect("move should succeed");
        following = *card;
    }

    let order = board.order(stage).await;
    assert_eq!(order.first(), Some(anchor));
    assert_eq!(order.last(), Some(mover));
    let mut expected_middle: Vec<_> = extra.clone();
    expected_middle.reverse();
    assert_eq!(order.get(1..order.len() - 1), Some(expected_middle.as_slice()));
    let positions: Vec<i64> = board
        .ordered(stage)
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect();
    assert!(positions.windows(2).all(|pair| pair.first() < pair.get(1)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn explicit_rebalance_restores_even_spacing(board: Board) {
    let (stage, ids) = board.seed(0, 1, &[-7, 0, 3, 4]);

    board
        .rebalancer
        .rebalance_stage(stage)
        .await
        .expect("rebalance should succeed");

    let expected: Vec<_> = ids
        .into_iter()
        .zip([65_536, 131_072, 196_608, 262_144])
        .collect();
    assert_eq!(board.ordered(stage).await, expected);
}
