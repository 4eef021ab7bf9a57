/// Credit ledger integration tests
///
/// Require PostgreSQL; see `common/mod.rs` for how to run them.

mod common;

use chrono::NaiveDate;
use common::{create_team, delete_team, setup_pool};
use songteam_shared::genre::Genre;
use songteam_shared::ledger::{self, GrantRequest, LedgerError};
use songteam_shared::models::credit_transaction::{CreditTransaction, TransactionType};
use songteam_shared::models::song::{CreateSong, Song, SongStatus};
use songteam_shared::models::team::Team;
use uuid::Uuid;

async fn insert_generating_song(pool: &sqlx::PgPool, team: &Team, user_id: Uuid) -> Song {
    let mut tx = pool.begin().await.unwrap();
    let song = Song::create(
        &mut *tx,
        CreateSong {
            team_id: team.id,
            created_by_user_id: user_id,
            title: "Rap Song".to_string(),
            genre: Genre::Rap,
            week_start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            week_end_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        },
    )
    .await
    .unwrap();
    ledger::consume_in(&mut tx, team.id, user_id, song.id).await.unwrap();
    assert!(Song::mark_generating(&mut *tx, song.id).await.unwrap());
    tx.commit().await.unwrap();
    song
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_grant_updates_balance_and_ledger() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 0).await;

    let outcome = ledger::grant(
        &pool,
        GrantRequest {
            team_id: team.id,
            amount: 5,
            transaction_type: TransactionType::AdminGranted,
            user_id: Some(owner),
            song_id: None,
            stripe_payment_id: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.balance(), 5);
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 5);
    assert_eq!(CreditTransaction::sum_for_team(&pool, team.id).await.unwrap(), 5);

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_grant_rejects_non_positive_amounts() {
    let pool = setup_pool().await;
    let team = create_team(&pool, Uuid::new_v4(), 0).await;

    for amount in [0, -3] {
        let result = ledger::grant(
            &pool,
            GrantRequest {
                team_id: team.id,
                amount,
                transaction_type: TransactionType::Granted,
                user_id: None,
                song_id: None,
                stripe_payment_id: None,
                notes: None,
            },
        )
        .await;
        assert!(matches!(result, Err(LedgerError::InvalidAmount(a)) if a == amount));
    }

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_grant_rejects_balance_overflow() {
    let pool = setup_pool().await;
    let team = create_team(&pool, Uuid::new_v4(), 1).await;

    let result = ledger::grant(
        &pool,
        GrantRequest {
            team_id: team.id,
            amount: i32::MAX,
            transaction_type: TransactionType::AdminGranted,
            user_id: None,
            song_id: None,
            stripe_payment_id: None,
            notes: None,
        },
    )
    .await;

    assert!(matches!(result, Err(LedgerError::InvalidAmount(i32::MAX))));
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 1);
    assert_eq!(CreditTransaction::sum_for_team(&pool, team.id).await.unwrap(), 1);

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_grant_to_unknown_team() {
    let pool = setup_pool().await;
    let missing = Uuid::new_v4();

    let result = ledger::grant(
        &pool,
        GrantRequest {
            team_id: missing,
            amount: 1,
            transaction_type: TransactionType::Granted,
            user_id: None,
            song_id: None,
            stripe_payment_id: None,
            notes: None,
        },
    )
    .await;

    assert!(matches!(result, Err(LedgerError::TeamNotFound(id)) if id == missing));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_consume_with_zero_balance_fails_and_writes_nothing() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 0).await;

    let mut tx = pool.begin().await.unwrap();
    let result = ledger::consume_in(&mut tx, team.id, owner, Uuid::new_v4()).await;
    tx.rollback().await.unwrap();

    assert!(matches!(
        result,
        Err(LedgerError::InsufficientCredits { balance: 0, .. })
    ));
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 0);
    assert!(ledger::history(&pool, team.id, 10).await.unwrap().is_empty());

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_consumes_never_overdraw() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 1).await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let pool = pool.clone();
        let team = team.clone();
        handles.push(tokio::spawn(async move {
            let mut tx = pool.begin().await.unwrap();
            let song = Song::create(
                &mut *tx,
                CreateSong {
                    team_id: team.id,
                    created_by_user_id: owner,
                    title: "Pop Song".to_string(),
                    genre: Genre::Pop,
                    week_start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
                    week_end_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
                },
            )
            .await
            .unwrap();
            let result = ledger::consume_in(&mut tx, team.id, owner, song.id).await;
            if result.is_ok() {
                tx.commit().await.unwrap();
            }
            result.is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 0);
    assert_eq!(CreditTransaction::sum_for_team(&pool, team.id).await.unwrap(), 0);

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_refund_is_idempotent_per_song() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 1).await;
    let song = insert_generating_song(&pool, &team, owner).await;
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 0);

    let mut tx = pool.begin().await.unwrap();
    let first = ledger::refund_song_in(&mut tx, team.id, song.id).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let second = ledger::refund_song_in(&mut tx, team.id, song.id).await.unwrap();
    tx.commit().await.unwrap();

    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 1);

    let refunds: Vec<_> = CreditTransaction::list_by_song(&pool, song.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Refunded)
        .collect();
    assert_eq!(refunds.len(), 1);

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_purchase_is_idempotent_per_payment() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 0).await;
    let payment_id = format!("pi_{}", Uuid::new_v4().simple());

    let purchase = || GrantRequest {
        team_id: team.id,
        amount: 20,
        transaction_type: TransactionType::Purchased,
        user_id: Some(owner),
        song_id: None,
        stripe_payment_id: Some(payment_id.clone()),
        notes: Some("Purchased via Stripe - 20 credits".to_string()),
    };

    let first = ledger::grant(&pool, purchase()).await.unwrap();
    let second = ledger::grant(&pool, purchase()).await.unwrap();

    assert_eq!(first.balance(), 20);
    assert!(second.is_duplicate());
    assert_eq!(ledger::balance(&pool, team.id).await.unwrap(), 20);

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_song_error_transition_happens_once() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 1).await;
    let song = insert_generating_song(&pool, &team, owner).await;

    assert!(Song::mark_error(&pool, song.id, "boom").await.unwrap());
    assert!(!Song::mark_error(&pool, song.id, "boom again").await.unwrap());
    assert!(!Song::mark_complete(&pool, song.id, "la", "https://cdn/x.mp3").await.unwrap());

    let reloaded = Song::find_by_id(&pool, song.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, SongStatus::Error);
    assert_eq!(reloaded.error_message.as_deref(), Some("boom"));

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_pending_song_cannot_skip_generating() {
    let pool = setup_pool().await;
    let owner = Uuid::new_v4();
    let team = create_team(&pool, owner, 0).await;

    let song = Song::create(
        &pool,
        CreateSong {
            team_id: team.id,
            created_by_user_id: owner,
            title: "Jazz Song".to_string(),
            genre: Genre::Jazz,
            week_start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            week_end_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        },
    )
    .await
    .unwrap();

    assert!(!Song::mark_complete(&pool, song.id, "la", "https://cdn/x.mp3").await.unwrap());
    assert!(!Song::mark_error(&pool, song.id, "boom").await.unwrap());
    assert_eq!(
        Song::find_by_id(&pool, song.id).await.unwrap().unwrap().status,
        SongStatus::Pending
    );

    assert!(Song::mark_generating(&pool, song.id).await.unwrap());
    assert!(!Song::mark_generating(&pool, song.id).await.unwrap());

    delete_team(&pool, team.id).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_join_code_lookup_is_case_insensitive() {
    let pool = setup_pool().await;
    let team = create_team(&pool, Uuid::new_v4(), 0).await;

    let lower = team.join_code.to_lowercase();
    let found = Team::find_by_join_code(&pool, &format!("  {}  ", lower))
        .await
        .unwrap()
        .expect("team found by lowercase code");
    assert_eq!(found.id, team.id);

    assert!(Team::find_by_join_code(&pool, "TEAMZZZZ0").await.unwrap().is_none());

    delete_team(&pool, team.id).await;
}
